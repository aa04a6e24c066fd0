use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use tracing::debug;

use crate::config::WebhookConfig;
use crate::crd::CrdInfo;
use crate::names::{self, WebhookNames};

use super::{BuildError, CompanionKind, service, to_object};

const FAILURE_POLICY_FAIL: &str = "Fail";
const SIDE_EFFECTS_NONE: &str = "None";
const ADMISSION_REVIEW_VERSION: &str = "v1";
const OPERATIONS: [&str; 2] = ["CREATE", "UPDATE"];

#[derive(Clone, Copy)]
enum Admission {
    Mutate,
    Validate,
}

impl Admission {
    fn as_str(self) -> &'static str {
        match self {
            Admission::Mutate => "mutate",
            Admission::Validate => "validate",
        }
    }

    fn entry_name(self, crd: &CrdInfo) -> String {
        match self {
            Admission::Mutate => names::mutating_webhook_name(&crd.singular, &crd.group),
            Admission::Validate => names::validating_webhook_name(&crd.singular, &crd.group),
        }
    }

    /// `/mutate-<group with dashes>-<version>-<singular>`, the path
    /// controller-runtime registers for a typed webhook.
    fn path(self, crd: &CrdInfo, version: &str) -> String {
        format!(
            "/{}-{}-{version}-{}",
            self.as_str(),
            crd.group.replace('.', "-"),
            crd.singular
        )
    }
}

/// The parts shared by mutating and validating webhook entries.
struct Entry {
    name: String,
    client_config: WebhookClientConfig,
    rules: Vec<RuleWithOperations>,
}

fn entries(config: &WebhookConfig, crds: &[CrdInfo], admission: Admission) -> Vec<Entry> {
    let names = WebhookNames::from_config(config);
    let port = service::effective_ports(&config.service).port;

    crds.iter()
        .filter(|crd| {
            let addressable = crd.is_addressable();
            if !addressable {
                debug!(
                    group = %crd.group,
                    plural = %crd.plural,
                    "skipping CustomResourceDefinition without group/names"
                );
            }
            addressable
        })
        .flat_map(|crd| crd.versions.iter().map(move |version| (crd, version)))
        .map(|(crd, version)| Entry {
            name: admission.entry_name(crd),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: names.service(),
                    namespace: names.namespace().to_string(),
                    path: Some(admission.path(crd, version)),
                    port: Some(port),
                }),
                ..Default::default()
            },
            rules: vec![RuleWithOperations {
                api_groups: Some(vec![crd.group.clone()]),
                api_versions: Some(vec![version.clone()]),
                resources: Some(vec![crd.plural.clone()]),
                operations: Some(OPERATIONS.iter().map(|op| op.to_string()).collect()),
                ..Default::default()
            }],
        })
        .collect()
}

fn metadata(names: &WebhookNames<'_>, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(names.namespace().to_string()),
        annotations: Some(names.certificate_annotation()),
        ..Default::default()
    }
}

pub fn build_mutating(
    config: &WebhookConfig,
    crds: &[CrdInfo],
) -> Result<DynamicObject, BuildError> {
    let names = WebhookNames::from_config(config);
    let name = names.mutating_configuration();

    let webhooks: Vec<MutatingWebhook> = entries(config, crds, Admission::Mutate)
        .into_iter()
        .map(|entry| MutatingWebhook {
            name: entry.name,
            admission_review_versions: vec![ADMISSION_REVIEW_VERSION.to_string()],
            client_config: entry.client_config,
            rules: Some(entry.rules),
            failure_policy: Some(FAILURE_POLICY_FAIL.to_string()),
            side_effects: SIDE_EFFECTS_NONE.to_string(),
            ..Default::default()
        })
        .collect();

    let configuration = MutatingWebhookConfiguration {
        metadata: metadata(&names, name.clone()),
        webhooks: (!webhooks.is_empty()).then_some(webhooks),
    };
    to_object(
        CompanionKind::MutatingWebhookConfiguration,
        &name,
        &configuration,
    )
}

pub fn build_validating(
    config: &WebhookConfig,
    crds: &[CrdInfo],
) -> Result<DynamicObject, BuildError> {
    let names = WebhookNames::from_config(config);
    let name = names.validating_configuration();

    let webhooks: Vec<ValidatingWebhook> = entries(config, crds, Admission::Validate)
        .into_iter()
        .map(|entry| ValidatingWebhook {
            name: entry.name,
            admission_review_versions: vec![ADMISSION_REVIEW_VERSION.to_string()],
            client_config: entry.client_config,
            rules: Some(entry.rules),
            failure_policy: Some(FAILURE_POLICY_FAIL.to_string()),
            side_effects: SIDE_EFFECTS_NONE.to_string(),
            ..Default::default()
        })
        .collect();

    let configuration = ValidatingWebhookConfiguration {
        metadata: metadata(&names, name.clone()),
        webhooks: (!webhooks.is_empty()).then_some(webhooks),
    };
    to_object(
        CompanionKind::ValidatingWebhookConfiguration,
        &name,
        &configuration,
    )
}
