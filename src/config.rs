use std::fmt;
use std::sync::LazyLock;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use kube::core::DynamicObject;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FN_CONFIG_GROUP: &str = "fn.kpt.dev";
pub const FN_CONFIG_VERSION: &str = "v1alpha1";
pub const FN_CONFIG_KIND: &str = "Webhook";

const CONFIG_MAP_KEY: &str = "webhook";

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("DNS label pattern is valid")
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "functionConfig is missing, expected `ConfigMap.v1` or `Webhook.v1alpha1.fn.kpt.dev`"
    )]
    Missing,
    #[error(
        "unknown functionConfig kind={kind} apiVersion={api_version}, expected `ConfigMap.v1` or `Webhook.v1alpha1.fn.kpt.dev`"
    )]
    UnknownKind { kind: String, api_version: String },
    #[error("cannot decode functionConfig ConfigMap key `webhook`: {0}")]
    Embedded(#[source] Box<figment::Error>),
    #[error("cannot decode functionConfig Webhook: {0}")]
    Typed(#[source] serde_json::Error),
    #[error("webhook name is required")]
    MissingName,
    #[error("webhook name `{0}` must be a lowercase RFC 1123 label")]
    InvalidName(String),
    #[error("webhook namespace is required")]
    MissingNamespace,
    #[error("webhook container name is required")]
    MissingContainer,
    #[error("webhook certificate issuerRef is required")]
    MissingIssuerRef,
    #[error("operation should be add or delete, got `{0}`")]
    InvalidOperation(String),
}

/// What the function does with the companion resources.
///
/// Unrecognised values decode successfully and are rejected by
/// [`WebhookConfig::validate`], so a bad operation is reported as a
/// validation failure rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Operation {
    Add,
    Delete,
    #[default]
    Unset,
    Other(String),
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "add" => Operation::Add,
            "delete" => Operation::Delete,
            "" => Operation::Unset,
            _ => Operation::Other(value),
        }
    }
}

/// A blank `operation:` decodes as unset.
impl From<Option<String>> for Operation {
    fn from(value: Option<String>) -> Self {
        value.map(Operation::from).unwrap_or_default()
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => f.write_str("add"),
            Operation::Delete => f.write_str("delete"),
            Operation::Unset => Ok(()),
            Operation::Other(other) => f.write_str(other),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Zero ports are treated as unset and defaulted by the Service builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub target_port: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    #[serde(default)]
    pub issuer_ref: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub operation: Operation,
    #[serde(default)]
    pub webhook: WebhookMeta,
    #[serde(default)]
    pub service: ServiceSpec,
    #[serde(default)]
    pub certificate: CertificateSpec,
    #[serde(default)]
    pub container: ContainerSpec,
}

impl WebhookConfig {
    /// Decodes the functionConfig, which is either a `ConfigMap` carrying the
    /// configuration as YAML text under `data.webhook`, or a
    /// `Webhook.v1alpha1.fn.kpt.dev` object.
    pub fn from_function_config(fc: Option<&DynamicObject>) -> Result<Self, ConfigError> {
        let Some(fc) = fc.filter(|fc| !is_empty(fc)) else {
            return Err(ConfigError::Missing);
        };
        let (api_version, kind) = fc
            .types
            .as_ref()
            .map(|t| (t.api_version.as_str(), t.kind.as_str()))
            .unwrap_or_default();

        if api_version == "v1" && kind == "ConfigMap" {
            let embedded = fc
                .data
                .get("data")
                .and_then(|d| d.get(CONFIG_MAP_KEY))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if embedded.is_empty() {
                return Ok(Self::default());
            }
            return Self::from_yaml(embedded);
        }

        if api_version == format!("{FN_CONFIG_GROUP}/{FN_CONFIG_VERSION}") && kind == FN_CONFIG_KIND
        {
            return serde_json::from_value(fc.data.clone()).map_err(ConfigError::Typed);
        }

        Err(ConfigError::UnknownKind {
            kind: kind.to_string(),
            api_version: api_version.to_string(),
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Yaml::string(text))
            .extract()
            .map_err(|e| ConfigError::Embedded(Box::new(e)))
    }

    /// Checks required fields in a fixed order and stops at the first failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_meta()?;
        self.validate_container()?;
        match &self.operation {
            Operation::Delete => Ok(()),
            Operation::Add => self.validate_certificate(),
            other => Err(ConfigError::InvalidOperation(other.to_string())),
        }
    }

    fn validate_meta(&self) -> Result<(), ConfigError> {
        let name = &self.webhook.name;
        if name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        if name.len() > 63 || !DNS_LABEL.is_match(name) {
            return Err(ConfigError::InvalidName(name.clone()));
        }
        if self.webhook.namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        Ok(())
    }

    fn validate_container(&self) -> Result<(), ConfigError> {
        if self.container.name.is_empty() {
            return Err(ConfigError::MissingContainer);
        }
        Ok(())
    }

    fn validate_certificate(&self) -> Result<(), ConfigError> {
        if self.certificate.issuer_ref.is_empty() {
            return Err(ConfigError::MissingIssuerRef);
        }
        Ok(())
    }
}

fn is_empty(fc: &DynamicObject) -> bool {
    fc.types.is_none()
        && fc.metadata.name.is_none()
        && fc.data.as_object().is_none_or(|m| m.is_empty())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Process settings, read from `WEBHOOK_FN_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for FnSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl FnSettings {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Env::prefixed("WEBHOOK_FN_"))
            .extract()
            .map_err(Box::new)
    }
}
