use std::collections::BTreeMap;

use crate::config::WebhookConfig;

pub const WEBHOOK_PREFIX: &str = "webhook";
pub const SERVICE_SUFFIX: &str = "svc";
pub const CERT_SUFFIX: &str = "serving-cert";
pub const CERT_PATH_SUFFIX: &str = "serving-certs";
pub const CERT_INJECTION_KEY: &str = "cert-manager.io/inject-ca-from";
pub const MUTATING_SUFFIX: &str = "mutating-configuration";
pub const VALIDATING_SUFFIX: &str = "validating-configuration";

/// Name of the ConfigMap the variant constructor generates; its group doubles
/// as the prefix of the service selector label.
pub const BUILTIN_CONFIG_MAP_NAME: &str = "kptfile.kpt.dev";

/// Directory the controller-runtime webhook server reads its serving
/// certificate from.
pub const CERT_MOUNT_DIR: &str = "/tmp/k8s-webhook-server";

/// Key of the label the webhook Service selects on.
pub fn selector_label_key() -> String {
    format!("{BUILTIN_CONFIG_MAP_NAME}/{VALIDATING_SUFFIX}")
}

/// Canonical names of every companion resource for one webhook identity.
pub struct WebhookNames<'a> {
    name: &'a str,
    namespace: &'a str,
}

impl<'a> WebhookNames<'a> {
    pub fn new(name: &'a str, namespace: &'a str) -> Self {
        Self { name, namespace }
    }

    pub fn from_config(config: &'a WebhookConfig) -> Self {
        Self::new(&config.webhook.name, &config.webhook.namespace)
    }

    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    pub fn base(&self) -> String {
        format!("{WEBHOOK_PREFIX}-{}", self.name)
    }

    pub fn service(&self) -> String {
        format!("{}-{SERVICE_SUFFIX}", self.base())
    }

    pub fn certificate(&self) -> String {
        format!("{}-{CERT_SUFFIX}", self.base())
    }

    pub fn mutating_configuration(&self) -> String {
        format!("{}-{MUTATING_SUFFIX}", self.base())
    }

    pub fn validating_configuration(&self) -> String {
        format!("{}-{VALIDATING_SUFFIX}", self.base())
    }

    /// `<service>.<namespace>.svc`, followed by any extra labels.
    pub fn dns_name(&self, extra: &[&str]) -> String {
        let service = self.service();
        let mut labels = vec![service.as_str(), self.namespace, SERVICE_SUFFIX];
        labels.extend_from_slice(extra);
        labels.join(".")
    }

    pub fn cert_mount_path(&self) -> String {
        format!("{CERT_MOUNT_DIR}/{CERT_PATH_SUFFIX}")
    }

    /// Annotation asking cert-manager's CA injector to fill in the CA bundle.
    pub fn certificate_annotation(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            CERT_INJECTION_KEY.to_string(),
            format!("{}/{}", self.namespace, self.certificate()),
        )])
    }
}

pub fn mutating_webhook_name(crd_singular: &str, crd_group: &str) -> String {
    format!("m{crd_singular}.{crd_group}")
}

pub fn validating_webhook_name(crd_singular: &str, crd_group: &str) -> String {
    format!("v{crd_singular}.{crd_group}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_names() {
        let names = WebhookNames::new("foo", "bar");
        assert_eq!(names.base(), "webhook-foo");
        assert_eq!(names.service(), "webhook-foo-svc");
        assert_eq!(names.certificate(), "webhook-foo-serving-cert");
        assert_eq!(
            names.mutating_configuration(),
            "webhook-foo-mutating-configuration"
        );
        assert_eq!(
            names.validating_configuration(),
            "webhook-foo-validating-configuration"
        );
    }

    #[test]
    fn test_dns_names() {
        let names = WebhookNames::new("foo", "bar");
        assert_eq!(names.dns_name(&[]), "webhook-foo-svc.bar.svc");
        assert_eq!(
            names.dns_name(&["cluster", "local"]),
            "webhook-foo-svc.bar.svc.cluster.local"
        );
    }

    #[test]
    fn test_certificate_annotation() {
        let names = WebhookNames::new("foo", "bar");
        let annotation = names.certificate_annotation();
        assert_eq!(
            annotation.get(CERT_INJECTION_KEY).map(String::as_str),
            Some("bar/webhook-foo-serving-cert")
        );
    }

    #[test]
    fn test_per_crd_webhook_names() {
        assert_eq!(
            mutating_webhook_name("widget", "example.com"),
            "mwidget.example.com"
        );
        assert_eq!(
            validating_webhook_name("widget", "example.com"),
            "vwidget.example.com"
        );
    }

    #[test]
    fn test_selector_label_key() {
        assert_eq!(
            selector_label_key(),
            "kptfile.kpt.dev/validating-configuration"
        );
    }
}
