use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec as K8sServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::config::{ServiceSpec, WebhookConfig};
use crate::names::{self, WebhookNames};

use super::{BuildError, BuildOutput, CompanionKind, to_object};

pub const DEFAULT_PORT: i32 = 443;
pub const DEFAULT_TARGET_PORT: i32 = 9443;

/// Ports with the zero sentinel replaced by defaults.
pub struct EffectivePorts {
    pub port: i32,
    pub target_port: i32,
    pub warnings: Vec<String>,
}

pub fn effective_ports(spec: &ServiceSpec) -> EffectivePorts {
    let mut warnings = Vec::new();
    let port = if spec.port == 0 {
        warnings.push(format!("service.port is unset, defaulting to {DEFAULT_PORT}"));
        DEFAULT_PORT
    } else {
        spec.port
    };
    let target_port = if spec.target_port == 0 {
        warnings.push(format!(
            "service.targetPort is unset, defaulting to {DEFAULT_TARGET_PORT}"
        ));
        DEFAULT_TARGET_PORT
    } else {
        spec.target_port
    };
    EffectivePorts {
        port,
        target_port,
        warnings,
    }
}

pub fn build(config: &WebhookConfig) -> Result<BuildOutput, BuildError> {
    let names = WebhookNames::from_config(config);
    let service_name = names.service();
    let ports = effective_ports(&config.service);

    let service = Service {
        metadata: ObjectMeta {
            name: Some(service_name.clone()),
            namespace: Some(names.namespace().to_string()),
            ..Default::default()
        },
        spec: Some(K8sServiceSpec {
            selector: Some(BTreeMap::from([(
                names::selector_label_key(),
                service_name.clone(),
            )])),
            ports: Some(vec![ServicePort {
                name: Some(names::WEBHOOK_PREFIX.to_string()),
                port: ports.port,
                target_port: Some(IntOrString::Int(ports.target_port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(BuildOutput {
        object: to_object(CompanionKind::Service, &service_name, &service)?,
        warnings: ports.warnings,
    })
}
