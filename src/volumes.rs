use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use k8s_openapi::api::core::v1::{SecretVolumeSource, Volume, VolumeMount};
use kube::core::DynamicObject;
use serde_json::Value;
use thiserror::Error;

use crate::config::WebhookConfig;
use crate::names::WebhookNames;
use crate::workload::{self, POD_SPEC_PATH};

/// File mode of the projected certificate files (0644).
pub const CERT_DEFAULT_MODE: i32 = 0o644;

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("{kind} `{name}` has no pod template")]
    NoPodTemplate { kind: String, name: String },
    #[error("container `{container}` not found in {kind} `{name}`")]
    ContainerNotFound {
        container: String,
        kind: String,
        name: String,
    },
    #[error("failed to serialize certificate volume: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to patch pod template: {0}")]
    Patch(#[from] json_patch::PatchError),
}

/// Mounts the serving-certificate secret into the configured container.
///
/// A volume or mount that already carries the webhook's name is replaced in
/// place, anything else in the pod template is left alone. The object is only
/// modified if every patch applies.
pub fn inject_cert_volume(
    object: &mut DynamicObject,
    config: &WebhookConfig,
) -> Result<(), InjectError> {
    let names = WebhookNames::from_config(config);
    let volume_name = names.base();
    let kind = object
        .types
        .as_ref()
        .map(|t| t.kind.clone())
        .unwrap_or_default();
    let object_name = object.metadata.name.clone().unwrap_or_default();

    let pod_spec = workload::pod_spec(&object.data).ok_or_else(|| InjectError::NoPodTemplate {
        kind: kind.clone(),
        name: object_name.clone(),
    })?;
    let container_idx = workload::find_container(object, &config.container.name).ok_or_else(
        || InjectError::ContainerNotFound {
            container: config.container.name.clone(),
            kind,
            name: object_name,
        },
    )?;
    let container = &pod_spec["containers"][container_idx];

    let volume = serde_json::to_value(Volume {
        name: volume_name.clone(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(names.certificate()),
            default_mode: Some(CERT_DEFAULT_MODE),
            ..Default::default()
        }),
        ..Default::default()
    })?;
    let mount = serde_json::to_value(VolumeMount {
        name: volume_name.clone(),
        mount_path: names.cert_mount_path(),
        read_only: Some(true),
        ..Default::default()
    })?;

    let idx_str = container_idx.to_string();
    let mut volumes_path: Vec<&str> = POD_SPEC_PATH.to_vec();
    volumes_path.push("volumes");
    let mut mounts_path: Vec<&str> = POD_SPEC_PATH.to_vec();
    mounts_path.extend_from_slice(&["containers", idx_str.as_str(), "volumeMounts"]);

    let patches = vec![
        upsert_named(pod_spec.get("volumes"), volumes_path, &volume_name, volume),
        upsert_named(container.get("volumeMounts"), mounts_path, &volume_name, mount),
    ];

    let mut data = object.data.clone();
    json_patch::patch(&mut data, &patches)?;
    object.data = data;
    Ok(())
}

/// Replaces the list entry called `name`, appends when there is none, and
/// creates the list when it is missing.
fn upsert_named(
    existing: Option<&Value>,
    path: Vec<&str>,
    name: &str,
    value: Value,
) -> PatchOperation {
    let Some(items) = existing.and_then(|v| v.as_array()) else {
        return PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(path),
            value: Value::Array(vec![value]),
        });
    };

    match items
        .iter()
        .position(|item| item.get("name").and_then(|n| n.as_str()) == Some(name))
    {
        Some(i) => {
            let idx_str = i.to_string();
            let tokens: Vec<&str> = path.iter().copied().chain([idx_str.as_str()]).collect();
            PatchOperation::Replace(ReplaceOperation {
                path: PointerBuf::from_tokens(tokens),
                value,
            })
        }
        None => {
            let tokens: Vec<&str> = path.iter().copied().chain(["-"]).collect();
            PatchOperation::Add(AddOperation {
                path: PointerBuf::from_tokens(tokens),
                value,
            })
        }
    }
}
