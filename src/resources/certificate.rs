use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

use crate::config::WebhookConfig;
use crate::names::WebhookNames;

use super::{BuildError, BuildOutput, CompanionKind, to_object};

pub const CERT_MANAGER_API_VERSION: &str = "cert-manager.io/v1";
pub const ISSUER_KIND: &str = "Issuer";

/// The subset of cert-manager's `Certificate` this function writes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Certificate {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: CertificateSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificateSpec {
    dns_names: Vec<String>,
    issuer_ref: IssuerRef,
    secret_name: String,
}

#[derive(Debug, Serialize)]
struct IssuerRef {
    kind: &'static str,
    name: String,
}

pub fn build(config: &WebhookConfig) -> Result<BuildOutput, BuildError> {
    let names = WebhookNames::from_config(config);
    let cert_name = names.certificate();

    let certificate = Certificate {
        api_version: CERT_MANAGER_API_VERSION,
        kind: CompanionKind::Certificate.as_str(),
        metadata: ObjectMeta {
            name: Some(cert_name.clone()),
            namespace: Some(names.namespace().to_string()),
            ..Default::default()
        },
        spec: CertificateSpec {
            dns_names: vec![names.dns_name(&[]), names.dns_name(&["cluster", "local"])],
            issuer_ref: IssuerRef {
                kind: ISSUER_KIND,
                name: config.certificate.issuer_ref.clone(),
            },
            secret_name: cert_name.clone(),
        },
    };

    to_object(CompanionKind::Certificate, &cert_name, &certificate).map(BuildOutput::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::tests::config;

    #[test]
    fn test_build_certificate() {
        let object = build(&config()).unwrap().object;

        let types = object.types.as_ref().unwrap();
        assert_eq!(types.api_version, "cert-manager.io/v1");
        assert_eq!(types.kind, "Certificate");
        assert_eq!(
            object.metadata.name.as_deref(),
            Some("webhook-foo-serving-cert")
        );
        assert_eq!(object.metadata.namespace.as_deref(), Some("bar"));

        let spec = &object.data["spec"];
        assert_eq!(spec["dnsNames"][0], "webhook-foo-svc.bar.svc");
        assert_eq!(spec["dnsNames"][1], "webhook-foo-svc.bar.svc.cluster.local");
        assert_eq!(spec["issuerRef"]["kind"], "Issuer");
        assert_eq!(spec["issuerRef"]["name"], "selfsigned-issuer");
        assert_eq!(spec["secretName"], "webhook-foo-serving-cert");
    }
}
