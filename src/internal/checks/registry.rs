use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::internal::model::handle::ModelHandle;

/// Reserved subdirectory a namespace keeps its checker modules in.
pub const CHECKS_SUBDIR: &str = "checks";
/// File-stem prefix reserved for checker modules.
pub const MODULE_PREFIX: &str = "checker_";
/// Name prefix reserved for check functions within a module.
pub const FUNCTION_PREFIX: &str = "check_";
/// Default module extension for script-hosted plugin sources.
pub const DEFAULT_MODULE_EXT: &str = "py";

/// Keyword options passed to a check function, keyed by option name.
pub type CheckOptions = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CheckError(pub String);

/// The capability interface every discovered check function satisfies.
///
/// Rows come back loosely typed; the executor validates them against the
/// result contract at call time. Discovery trusts nothing but the name.
pub trait CheckFunction: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, model: &ModelHandle, options: &CheckOptions) -> Result<Vec<Value>, CheckError>;

    /// Opt-in declaration that the function touches nothing but the model
    /// handle. Only declared functions are eligible for parallel execution.
    fn side_effect_free(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("module '{module}' failed to load: {reason}")]
    ModuleLoad { module: String, reason: String },
}

type ModuleLoadFn = dyn Fn() -> Result<Vec<Arc<dyn CheckFunction>>, DiscoveryError> + Send + Sync;

/// One candidate module within a plugin source: a relative path plus a
/// deferred loader. Loading is deferred so one broken module cannot take
/// down discovery of its neighbors.
pub struct CheckerModule {
    path: String,
    load: Box<ModuleLoadFn>,
}

impl CheckerModule {
    pub fn new<F>(path: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Result<Vec<Arc<dyn CheckFunction>>, DiscoveryError> + Send + Sync + 'static,
    {
        CheckerModule {
            path: path.into(),
            load: Box::new(load),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Arc<dyn CheckFunction>>, DiscoveryError> {
        (self.load)()
    }
}

/// A namespaced location checker modules are discovered from. Teams own
/// sources; the registry owns the naming contract.
pub trait PluginSource: Send + Sync {
    fn namespace(&self) -> &str;

    /// Extension the source's plugin host understands. Files with any other
    /// extension are invisible to discovery.
    fn module_extension(&self) -> &str {
        DEFAULT_MODULE_EXT
    }

    fn modules(&self) -> Vec<CheckerModule>;
}

/// One discovered check function with its provenance.
#[derive(Clone)]
pub struct RegisteredCheck {
    pub namespace: String,
    pub module: String,
    pub name: String,
    pub func: Arc<dyn CheckFunction>,
}

/// Ordered, immutable list of discovered check functions.
///
/// Built once at process start (or on explicit refresh by rebuilding).
/// Ordering is a stable sort by namespace then function name so execution
/// and result ordering are reproducible across runs.
pub struct CheckerRegistry {
    checks: Vec<RegisteredCheck>,
}

impl CheckerRegistry {
    pub fn discover(sources: &[Box<dyn PluginSource>]) -> Self {
        let mut checks = Vec::new();

        for source in sources {
            let namespace = source.namespace();
            for module in source.modules() {
                if !is_checker_module(module.path(), source.module_extension()) {
                    tracing::debug!(
                        namespace,
                        module = module.path(),
                        "ignoring non-checker file"
                    );
                    continue;
                }

                let functions = match module.load() {
                    Ok(functions) => functions,
                    Err(e) => {
                        // One broken module must not abort discovery.
                        tracing::warn!(namespace, module = module.path(), error = %e, "skipping module");
                        continue;
                    }
                };

                for func in functions {
                    if !func.name().starts_with(FUNCTION_PREFIX) {
                        continue;
                    }
                    checks.push(RegisteredCheck {
                        namespace: namespace.to_string(),
                        module: module.path().to_string(),
                        name: func.name().to_string(),
                        func,
                    });
                }
            }
        }

        checks.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

        tracing::info!(count = checks.len(), "checker discovery complete");
        CheckerRegistry { checks }
    }

    pub fn checks(&self) -> &[RegisteredCheck] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// A checker module lives directly under `checks/`, its stem starts with
/// `checker_`, and its extension matches the source's plugin host.
fn is_checker_module(relative_path: &str, extension: &str) -> bool {
    let path = Path::new(relative_path);
    let under_checks = path
        .parent()
        .and_then(Path::to_str)
        .map(|p| p == CHECKS_SUBDIR)
        .unwrap_or(false);
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.starts_with(MODULE_PREFIX))
        .unwrap_or(false);
    let ext_matches = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| e == extension)
        .unwrap_or(false);
    under_checks && stem_matches && ext_matches
}


#[cfg(test)]
mod tests {
    use super::testing::{FnCheck, StaticSource};
    use super::*;
    use serde_json::json;

    fn row_stub() -> Vec<Value> {
        vec![json!({
            "element_id": null,
            "element_type": "Summary",
            "element_name": "stub",
            "element_name_long": null,
            "check_status": "pass",
            "actual_value": "1",
            "required_value": "1",
            "comment": null,
            "log": null
        })]
    }

    #[test]
    fn only_checker_modules_and_check_functions_register() {
        let source = StaticSource::new("arch")
            .with_module(
                "checks/checker_walls.py",
                vec![
                    FnCheck::new("check_wall_rating", |_, _| Ok(row_stub())),
                    // Helper without the reserved prefix: invisible.
                    FnCheck::new("collect_walls", |_, _| Ok(row_stub())),
                ],
            )
            .with_module(
                "checks/other.py",
                vec![FnCheck::new("check_hidden", |_, _| Ok(row_stub()))],
            )
            .with_module(
                "checks/checker_notes.ipynb",
                vec![FnCheck::new("check_notebook", |_, _| Ok(row_stub()))],
            );

        let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(source)];
        let registry = CheckerRegistry::discover(&sources);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.checks()[0].name, "check_wall_rating");
        assert_eq!(registry.checks()[0].module, "checks/checker_walls.py");
    }

    #[test]
    fn modules_outside_the_checks_subdir_are_invisible() {
        let source = StaticSource::new("arch").with_module(
            "scratch/checker_walls.py",
            vec![FnCheck::new("check_wall_rating", |_, _| Ok(row_stub()))],
        );
        let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(source)];
        assert!(CheckerRegistry::discover(&sources).is_empty());
    }

    #[test]
    fn a_broken_module_does_not_abort_discovery() {
        let source = StaticSource::new("arch")
            .with_broken_module("checks/checker_broken.py")
            .with_module(
                "checks/checker_walls.py",
                vec![FnCheck::new("check_wall_rating", |_, _| Ok(row_stub()))],
            );
        let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(source)];
        let registry = CheckerRegistry::discover(&sources);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.checks()[0].name, "check_wall_rating");
    }

    #[test]
    fn discovery_order_is_namespace_then_function_name() {
        let arch = StaticSource::new("arch").with_module(
            "checks/checker_walls.py",
            vec![
                FnCheck::new("check_z_last", |_, _| Ok(row_stub())),
                FnCheck::new("check_a_first", |_, _| Ok(row_stub())),
            ],
        );
        let mep = StaticSource::new("mep").with_module(
            "checks/checker_ducts.py",
            vec![FnCheck::new("check_duct_sizing", |_, _| Ok(row_stub()))],
        );

        // Source order reversed on purpose; output order must not depend on it.
        let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(mep), Box::new(arch)];
        let registry = CheckerRegistry::discover(&sources);

        let names: Vec<(&str, &str)> = registry
            .checks()
            .iter()
            .map(|c| (c.namespace.as_str(), c.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("arch", "check_a_first"),
                ("arch", "check_z_last"),
                ("mep", "check_duct_sizing"),
            ]
        );
    }
}
