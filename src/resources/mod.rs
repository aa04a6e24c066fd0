pub mod certificate;
pub mod service;
pub mod webhook;

use std::fmt;

use kube::core::DynamicObject;
use serde::Serialize;
use thiserror::Error;

use crate::config::WebhookConfig;
use crate::crd::CrdInfo;
use crate::names::WebhookNames;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to convert {kind} `{name}` into a resource document: {source}")]
    Convert {
        kind: CompanionKind,
        name: String,
        source: serde_json::Error,
    },
    #[error("{kind} builder called without {expected}")]
    InvalidContext {
        kind: CompanionKind,
        expected: &'static str,
    },
}

impl BuildError {
    /// Contract violations are programming errors rather than bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, BuildError::InvalidContext { .. })
    }
}

/// The four resources synthesized alongside a webhook deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompanionKind {
    Service,
    Certificate,
    MutatingWebhookConfiguration,
    ValidatingWebhookConfiguration,
}

impl CompanionKind {
    pub const ALL: [CompanionKind; 4] = [
        CompanionKind::Service,
        CompanionKind::Certificate,
        CompanionKind::MutatingWebhookConfiguration,
        CompanionKind::ValidatingWebhookConfiguration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompanionKind::Service => "Service",
            CompanionKind::Certificate => "Certificate",
            CompanionKind::MutatingWebhookConfiguration => "MutatingWebhookConfiguration",
            CompanionKind::ValidatingWebhookConfiguration => "ValidatingWebhookConfiguration",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }

    pub fn object_name(self, names: &WebhookNames<'_>) -> String {
        match self {
            CompanionKind::Service => names.service(),
            CompanionKind::Certificate => names.certificate(),
            CompanionKind::MutatingWebhookConfiguration => names.mutating_configuration(),
            CompanionKind::ValidatingWebhookConfiguration => names.validating_configuration(),
        }
    }

    /// The context this kind's builder takes.
    pub fn context(self, crds: &[CrdInfo]) -> BuildContext<'_> {
        match self {
            CompanionKind::Service | CompanionKind::Certificate => BuildContext::Standalone,
            CompanionKind::MutatingWebhookConfiguration
            | CompanionKind::ValidatingWebhookConfiguration => BuildContext::Crds(crds),
        }
    }
}

impl fmt::Display for CompanionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BuildContext<'a> {
    Standalone,
    Crds(&'a [CrdInfo]),
}

pub struct BuildOutput {
    pub object: DynamicObject,
    /// Non-fatal notes about defaults the builder had to apply.
    pub warnings: Vec<String>,
}

impl BuildOutput {
    fn new(object: DynamicObject) -> Self {
        Self {
            object,
            warnings: Vec::new(),
        }
    }
}

pub fn build(
    kind: CompanionKind,
    config: &WebhookConfig,
    context: BuildContext<'_>,
) -> Result<BuildOutput, BuildError> {
    match (kind, context) {
        (CompanionKind::Service, _) => service::build(config),
        (CompanionKind::Certificate, _) => certificate::build(config),
        (CompanionKind::MutatingWebhookConfiguration, BuildContext::Crds(crds)) => {
            webhook::build_mutating(config, crds).map(BuildOutput::new)
        }
        (CompanionKind::ValidatingWebhookConfiguration, BuildContext::Crds(crds)) => {
            webhook::build_validating(config, crds).map(BuildOutput::new)
        }
        (kind, BuildContext::Standalone) => Err(BuildError::InvalidContext {
            kind,
            expected: "the CustomResourceDefinitions in the resource list",
        }),
    }
}

/// Round-trips a typed resource into the list's document representation.
fn to_object<T: Serialize>(
    kind: CompanionKind,
    name: &str,
    resource: &T,
) -> Result<DynamicObject, BuildError> {
    serde_json::to_value(resource)
        .and_then(serde_json::from_value)
        .map_err(|source| BuildError::Convert {
            kind,
            name: name.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CertificateSpec, ContainerSpec, Operation, ServiceSpec, WebhookMeta};

    pub(crate) fn config() -> WebhookConfig {
        WebhookConfig {
            operation: Operation::Add,
            webhook: WebhookMeta {
                name: "foo".to_string(),
                namespace: "bar".to_string(),
            },
            service: ServiceSpec {
                port: 443,
                target_port: 9443,
            },
            certificate: CertificateSpec {
                issuer_ref: "selfsigned-issuer".to_string(),
            },
            container: ContainerSpec {
                name: "manager".to_string(),
            },
        }
    }

    #[test]
    fn test_kind_lookup() {
        for kind in CompanionKind::ALL {
            assert_eq!(CompanionKind::from_kind(kind.as_str()), Some(kind));
        }
        assert_eq!(CompanionKind::from_kind("Deployment"), None);
    }

    #[test]
    fn test_object_names() {
        let config = config();
        let names = WebhookNames::from_config(&config);
        assert_eq!(
            CompanionKind::Service.object_name(&names),
            "webhook-foo-svc"
        );
        assert_eq!(
            CompanionKind::ValidatingWebhookConfiguration.object_name(&names),
            "webhook-foo-validating-configuration"
        );
    }

    #[test]
    fn test_every_kind_builds_with_its_context() {
        let config = config();
        for kind in CompanionKind::ALL {
            let output = build(kind, &config, kind.context(&[])).unwrap();
            let types = output.object.types.as_ref().unwrap();
            assert_eq!(types.kind, kind.as_str());
            assert_eq!(
                output.object.metadata.name.as_deref(),
                Some(kind.object_name(&WebhookNames::from_config(&config)).as_str())
            );
        }
    }

    #[test]
    fn test_webhook_builder_without_crds_is_contract_violation() {
        let config = config();
        let err = build(
            CompanionKind::MutatingWebhookConfiguration,
            &config,
            BuildContext::Standalone,
        )
        .err()
        .unwrap();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("MutatingWebhookConfiguration"));
    }
}
