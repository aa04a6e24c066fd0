use kube::core::DynamicObject;
use serde_json::Value;

/// Kinds whose pod template may hold the webhook server container.
pub const WORKLOAD_KINDS: [&str; 5] = [
    "ReplicationController",
    "Deployment",
    "ReplicaSet",
    "StatefulSet",
    "DaemonSet",
];

pub const POD_SPEC_PATH: [&str; 3] = ["spec", "template", "spec"];

pub fn is_workload_kind(kind: &str) -> bool {
    WORKLOAD_KINDS.contains(&kind)
}

pub fn pod_spec(data: &Value) -> Option<&Value> {
    data.get("spec")?.get("template")?.get("spec")
}

pub fn containers(pod_spec: &Value) -> Vec<(usize, &Value)> {
    pod_spec
        .get("containers")
        .and_then(|c| c.as_array())
        .map(|arr| arr.iter().enumerate().collect())
        .unwrap_or_default()
}

pub fn container_name(container: &Value) -> &str {
    container
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or_default()
}

/// Index of the named container in the object's pod template.
pub fn find_container(object: &DynamicObject, name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    let pod_spec = pod_spec(&object.data)?;
    containers(pod_spec)
        .into_iter()
        .find(|(_, c)| container_name(c) == name)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_container() {
        let object: DynamicObject = serde_yaml::from_str(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: controller
spec:
  template:
    spec:
      containers:
      - name: proxy
        image: proxy:v1
      - name: manager
        image: manager:v1
"#,
        )
        .unwrap();
        assert_eq!(find_container(&object, "manager"), Some(1));
        assert_eq!(find_container(&object, "proxy"), Some(0));
        assert_eq!(find_container(&object, "missing"), None);
        assert_eq!(find_container(&object, ""), None);
    }

    #[test]
    fn test_no_pod_template() {
        let object: DynamicObject = serde_yaml::from_str(
            r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  key: value
"#,
        )
        .unwrap();
        assert_eq!(find_container(&object, "manager"), None);
    }

    #[test]
    fn test_workload_kinds() {
        assert!(is_workload_kind("Deployment"));
        assert!(is_workload_kind("ReplicationController"));
        assert!(!is_workload_kind("Pod"));
        assert!(!is_workload_kind("CronJob"));
    }
}
