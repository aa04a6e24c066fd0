use kube::core::DynamicObject;
use serde_json::Value;

pub const CRD_KIND: &str = "CustomResourceDefinition";

/// The parts of a CustomResourceDefinition an admission rule is made of.
///
/// Missing fields come back empty; an empty identity or version list simply
/// contributes no webhook entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrdInfo {
    pub singular: String,
    pub plural: String,
    pub group: String,
    pub versions: Vec<String>,
}

impl CrdInfo {
    pub fn from_object(object: &DynamicObject) -> Self {
        let spec = object.data.get("spec");
        let names = spec.and_then(|s| s.get("names"));

        let singular = match str_field(names, "singular") {
            "" => str_field(names, "kind").to_lowercase(),
            singular => singular.to_string(),
        };

        let versions = spec
            .and_then(|s| s.get("versions"))
            .and_then(|v| v.as_array())
            .map(|versions| {
                versions
                    .iter()
                    .filter(|v| v.get("served").and_then(Value::as_bool) != Some(false))
                    .filter_map(|v| v.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            singular,
            plural: str_field(names, "plural").to_string(),
            group: str_field(spec, "group").to_string(),
            versions,
        }
    }

    /// Whether this CRD carries enough identity to build a rule from.
    pub fn is_addressable(&self) -> bool {
        !self.singular.is_empty() && !self.plural.is_empty() && !self.group.is_empty()
    }
}

fn str_field<'a>(parent: Option<&'a Value>, key: &str) -> &'a str {
    parent
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crd(yaml: &str) -> DynamicObject {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_introspect_crd() {
        let info = CrdInfo::from_object(&crd(r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
    plural: widgets
    singular: widget
  scope: Namespaced
  versions:
  - name: v1
    served: true
    storage: true
  - name: v1beta1
    served: true
    storage: false
"#));
        assert_eq!(
            info,
            CrdInfo {
                singular: "widget".to_string(),
                plural: "widgets".to_string(),
                group: "example.com".to_string(),
                versions: vec!["v1".to_string(), "v1beta1".to_string()],
            }
        );
        assert!(info.is_addressable());
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let info = CrdInfo::from_object(&crd(r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: broken
"#));
        assert_eq!(info, CrdInfo::default());
        assert!(!info.is_addressable());
    }

    #[test]
    fn test_singular_defaults_to_kind() {
        let info = CrdInfo::from_object(&crd(r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: gadgets.example.com
spec:
  group: example.com
  names:
    kind: Gadget
    plural: gadgets
  versions:
  - name: v1
"#));
        assert_eq!(info.singular, "gadget");
        assert_eq!(info.versions, vec!["v1".to_string()]);
    }

    #[test]
    fn test_unserved_versions_skipped() {
        let info = CrdInfo::from_object(&crd(r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: gadgets.example.com
spec:
  group: example.com
  names:
    kind: Gadget
    plural: gadgets
    singular: gadget
  versions:
  - name: v1
    served: true
  - name: v1alpha1
    served: false
"#));
        assert_eq!(info.versions, vec!["v1".to_string()]);
    }
}
