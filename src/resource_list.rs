use std::fmt;

use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RESOURCE_LIST_API_VERSION: &str = "config.kubernetes.io/v1";
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

const PATH_ANNOTATIONS: [&str; 2] = [
    "internal.config.kubernetes.io/path",
    "config.kubernetes.io/path",
];
const INDEX_ANNOTATIONS: [&str; 2] = [
    "internal.config.kubernetes.io/index",
    "config.kubernetes.io/index",
];

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse ResourceList: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("failed to parse functionConfig from {path}: {source}")]
    ParseFunctionConfig {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("failed to serialize ResourceList: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

fn default_api_version() -> String {
    RESOURCE_LIST_API_VERSION.to_string()
}

fn default_kind() -> String {
    RESOURCE_LIST_KIND.to_string()
}

/// The KRM function wire format: every document a function sees and returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub items: Vec<DynamicObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_config: Option<DynamicObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FnResult>,
}

impl ResourceList {
    #[cfg(test)]
    pub fn new(items: Vec<DynamicObject>, function_config: Option<DynamicObject>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            items,
            function_config,
            results: Vec::new(),
        }
    }

    pub fn from_yaml(input: &str) -> Result<Self, TransportError> {
        serde_yaml::from_str(input).map_err(TransportError::Parse)
    }

    pub fn to_yaml(&self) -> Result<String, TransportError> {
        serde_yaml::to_string(self).map_err(TransportError::Serialize)
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(FnResult::is_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceRef {
    pub fn from_object(object: &DynamicObject) -> Self {
        let (api_version, kind) = object
            .types
            .as_ref()
            .map(|t| (t.api_version.clone(), t.kind.clone()))
            .unwrap_or_default();
        Self {
            api_version,
            kind,
            name: object.metadata.name.clone().unwrap_or_default(),
            namespace: object.metadata.namespace.clone(),
        }
    }
}

/// Where a document came from on disk, as recorded by the orchestrator in
/// the item's annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
    #[serde(default)]
    pub index: usize,
}

impl FileRef {
    pub fn from_object(object: &DynamicObject) -> Option<Self> {
        let annotations = object.metadata.annotations.as_ref()?;
        let path = PATH_ANNOTATIONS
            .iter()
            .find_map(|key| annotations.get(*key))?
            .clone();
        let index = INDEX_ANNOTATIONS
            .iter()
            .find_map(|key| annotations.get(*key))
            .and_then(|i| i.parse().ok())
            .unwrap_or(0);
        Some(Self { path, index })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FnResult {
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
}

impl FnResult {
    fn new(severity: Severity, message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            severity,
            resource_ref: None,
            file: None,
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl fmt::Display) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl fmt::Display) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn with_resource(mut self, object: &DynamicObject) -> Self {
        self.resource_ref = Some(ResourceRef::from_object(object));
        self.file = FileRef::from_object(object);
        self
    }

    /// Attributes the result to a document that is not (or no longer) in the list.
    pub fn with_resource_ref(mut self, resource_ref: ResourceRef) -> Self {
        self.resource_ref = Some(resource_ref);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"
apiVersion: config.kubernetes.io/v1
kind: ResourceList
items:
- apiVersion: apps/v1
  kind: Deployment
  metadata:
    name: controller
    namespace: system
    annotations:
      internal.config.kubernetes.io/path: config/manager.yaml
      internal.config.kubernetes.io/index: "2"
  spec:
    replicas: 1
functionConfig:
  apiVersion: v1
  kind: ConfigMap
  metadata:
    name: webhook
  data:
    webhook: "operation: add"
"#;

    #[test]
    fn test_parse_resource_list() {
        let rl = ResourceList::from_yaml(INPUT).unwrap();
        assert_eq!(rl.kind, RESOURCE_LIST_KIND);
        assert_eq!(rl.items.len(), 1);
        assert_eq!(rl.items[0].data["spec"]["replicas"], 1);
        let fc = rl.function_config.as_ref().unwrap();
        assert_eq!(fc.types.as_ref().unwrap().kind, "ConfigMap");
        assert!(rl.results.is_empty());
    }

    #[test]
    fn test_result_attribution() {
        let rl = ResourceList::from_yaml(INPUT).unwrap();
        let result = FnResult::error("boom").with_resource(&rl.items[0]);
        let resource = result.resource_ref.as_ref().unwrap();
        assert_eq!(resource.kind, "Deployment");
        assert_eq!(resource.name, "controller");
        assert_eq!(resource.namespace.as_deref(), Some("system"));
        assert_eq!(
            result.file,
            Some(FileRef {
                path: "config/manager.yaml".to_string(),
                index: 2,
            })
        );
    }

    #[test]
    fn test_results_serialized() {
        let mut rl = ResourceList::from_yaml(INPUT).unwrap();
        assert!(!rl.has_errors());
        rl.results.push(FnResult::info("created"));
        rl.results.push(FnResult::error("container not found"));
        assert!(rl.has_errors());

        let out = rl.to_yaml().unwrap();
        let reparsed = ResourceList::from_yaml(&out).unwrap();
        assert_eq!(reparsed.results, rl.results);
        assert!(out.contains("severity: error"));
        assert!(!out.contains("resourceRef"));
    }

    #[test]
    fn test_passthrough_keeps_key_order() {
        let rl = ResourceList::from_yaml(
            r#"
items:
- apiVersion: apps/v1
  kind: Deployment
  metadata:
    name: controller
  spec:
    template:
      spec:
        containers:
        - name: manager
          image: manager:v1
"#,
        )
        .unwrap();
        let out = rl.to_yaml().unwrap();
        let name = out.find("name: manager").unwrap();
        let image = out.find("image: manager:v1").unwrap();
        assert!(name < image, "{out}");
    }

    #[test]
    fn test_unparsable_list() {
        let err = ResourceList::from_yaml("items: [").unwrap_err();
        assert!(matches!(err, TransportError::Parse(_)));
    }
}
