use kube::core::DynamicObject;
use tracing::{debug, error, info, warn};

use crate::config::{Operation, WebhookConfig};
use crate::crd::{CRD_KIND, CrdInfo};
use crate::names::WebhookNames;
use crate::resource_list::{FnResult, ResourceList, ResourceRef};
use crate::resources::{self, CompanionKind};
use crate::volumes;
use crate::workload;

/// Where a companion resource sits in the list, if it is there at all.
struct Located {
    kind: CompanionKind,
    name: String,
    index: Option<usize>,
}

/// Everything one pass over the resource list finds.
struct Scan {
    companions: Vec<Located>,
    workload: Option<usize>,
    /// Further workloads running the container; only the first is used.
    ignored_workloads: Vec<usize>,
    crds: Vec<CrdInfo>,
}

pub struct WebhookTransformer<'a> {
    config: &'a WebhookConfig,
}

impl<'a> WebhookTransformer<'a> {
    pub fn new(config: &'a WebhookConfig) -> Self {
        Self { config }
    }

    /// Adds or removes the webhook's companion resources in `items`.
    ///
    /// Errors are reported in the returned results and never stop the pass,
    /// except a missing target container, which leaves `items` untouched.
    pub fn transform(&self, items: &mut Vec<DynamicObject>) -> Vec<FnResult> {
        let scan = self.scan(items);
        let container = &self.config.container.name;

        let Some(workload_idx) = scan.workload else {
            error!(container = %container, "container not found in any workload");
            return vec![FnResult::error(format!(
                "container `{container}` not found"
            ))];
        };

        let mut results: Vec<FnResult> = scan
            .ignored_workloads
            .iter()
            .map(|&i| {
                warn!(
                    container = %container,
                    index = i,
                    used = workload_idx,
                    "container found in more than one workload, using the first"
                );
                FnResult::warning(format!(
                    "container `{container}` also found here, only the first workload in the list is modified"
                ))
                .with_resource(&items[i])
            })
            .collect();

        match &self.config.operation {
            Operation::Add => self.apply(items, &scan, workload_idx, &mut results),
            Operation::Delete => self.remove(items, &scan, &mut results),
            other => debug!(operation = %other, "no valid operation, resources left unchanged"),
        }
        results
    }

    fn scan(&self, items: &[DynamicObject]) -> Scan {
        let names = WebhookNames::from_config(self.config);
        let mut companions: Vec<Located> = CompanionKind::ALL
            .into_iter()
            .map(|kind| Located {
                kind,
                name: kind.object_name(&names),
                index: None,
            })
            .collect();
        let mut workload = None;
        let mut ignored_workloads = Vec::new();
        let mut crds = Vec::new();

        for (i, object) in items.iter().enumerate() {
            let kind = kind_of(object);
            if kind == CRD_KIND {
                crds.push(CrdInfo::from_object(object));
            } else if workload::is_workload_kind(kind) {
                if workload::find_container(object, &self.config.container.name).is_some() {
                    match workload {
                        None => workload = Some(i),
                        Some(_) => ignored_workloads.push(i),
                    }
                }
            } else if let Some(companion) = CompanionKind::from_kind(kind) {
                let located = companions
                    .iter_mut()
                    .find(|l| l.kind == companion)
                    .filter(|l| l.index.is_none());
                if let Some(located) = located {
                    if object.metadata.name.as_deref() == Some(located.name.as_str()) {
                        located.index = Some(i);
                    }
                }
            }
        }

        debug!(
            crds = crds.len(),
            workload = ?workload,
            found = companions.iter().filter(|l| l.index.is_some()).count(),
            "scanned resource list"
        );

        Scan {
            companions,
            workload,
            ignored_workloads,
            crds,
        }
    }

    fn apply(
        &self,
        items: &mut Vec<DynamicObject>,
        scan: &Scan,
        workload_idx: usize,
        results: &mut Vec<FnResult>,
    ) {
        for located in &scan.companions {
            let kind = located.kind;
            let output = match resources::build(kind, self.config, kind.context(&scan.crds)) {
                Ok(output) => output,
                Err(e) => {
                    if e.is_contract_violation() {
                        error!(kind = %kind, name = %located.name, "builder contract violated: {e}");
                    } else {
                        warn!(kind = %kind, name = %located.name, "failed to build companion resource: {e}");
                    }
                    results.push(FnResult::error(&e).with_resource_ref(ResourceRef {
                        api_version: String::new(),
                        kind: kind.to_string(),
                        name: located.name.clone(),
                        namespace: Some(self.config.webhook.namespace.clone()),
                    }));
                    continue;
                }
            };

            for warning in &output.warnings {
                results.push(FnResult::warning(warning).with_resource(&output.object));
            }

            let (index, verb) = match located.index {
                Some(i) => {
                    items[i] = output.object;
                    (i, "replaced")
                }
                None => {
                    items.push(output.object);
                    (items.len() - 1, "created")
                }
            };
            info!(kind = %kind, name = %located.name, index, "{verb} companion resource");
            results.push(
                FnResult::info(format!("{verb} {kind} `{}`", located.name))
                    .with_resource(&items[index]),
            );
        }

        let workload = &mut items[workload_idx];
        match volumes::inject_cert_volume(workload, self.config) {
            Ok(()) => {
                info!(
                    index = workload_idx,
                    container = %self.config.container.name,
                    "mounted serving certificate"
                );
                results.push(
                    FnResult::info(format!(
                        "mounted serving certificate into container `{}`",
                        self.config.container.name
                    ))
                    .with_resource(workload),
                );
            }
            Err(e) => {
                warn!(index = workload_idx, "failed to mount serving certificate: {e}");
                results.push(FnResult::error(&e).with_resource(workload));
            }
        }
    }

    fn remove(&self, items: &mut Vec<DynamicObject>, scan: &Scan, results: &mut Vec<FnResult>) {
        let mut indices: Vec<usize> = scan.companions.iter().filter_map(|l| l.index).collect();
        // Highest first, so earlier removals never shift the remaining indices.
        indices.sort_unstable_by(|a, b| b.cmp(a));

        for idx in indices {
            let object = items.remove(idx);
            let kind = kind_of(&object);
            let name = object.metadata.name.as_deref().unwrap_or_default();
            info!(kind, name, index = idx, "removed companion resource");
            results.push(FnResult::info(format!("removed {kind} `{name}`")).with_resource(&object));
        }
    }
}

fn kind_of(object: &DynamicObject) -> &str {
    object
        .types
        .as_ref()
        .map(|t| t.kind.as_str())
        .unwrap_or_default()
}

/// Decodes and validates the functionConfig, then transforms the items.
///
/// Configuration problems are reported but do not stop the transform, which
/// proceeds with whatever could be decoded.
pub fn run(rl: &mut ResourceList) {
    let fc = rl.function_config.as_ref();
    let attribute = |result: FnResult| match fc {
        Some(fc) => result.with_resource(fc),
        None => result,
    };

    let config = match WebhookConfig::from_function_config(fc) {
        Ok(config) => config,
        Err(e) => {
            warn!("invalid functionConfig: {e}");
            rl.results.push(attribute(FnResult::error(&e)));
            WebhookConfig::default()
        }
    };
    if let Err(e) = config.validate() {
        warn!("functionConfig failed validation: {e}");
        rl.results.push(attribute(FnResult::error(&e)));
    }

    info!(
        operation = %config.operation,
        webhook = %config.webhook.name,
        namespace = %config.webhook.namespace,
        container = %config.container.name,
        items = rl.items.len(),
        "transforming resource list"
    );
    let results = WebhookTransformer::new(&config).transform(&mut rl.items);
    rl.results.extend(results);
}
