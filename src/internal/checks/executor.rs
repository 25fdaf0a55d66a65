use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use crate::internal::checks::registry::{CheckOptions, CheckerRegistry, RegisteredCheck};
use crate::internal::checks::result::CheckResult;
use crate::internal::model::handle::ModelHandle;

/// How a run distributes work across check functions.
///
/// Sequential is the default: an arbitrary plugin gives no thread-safety
/// guarantee for the shared model handle. Parallel mode only ever runs
/// functions that declare themselves side-effect-free; everything else
/// still runs sequentially, and output order stays registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel { max_workers: usize },
}

/// Per-run executor inputs beyond the model itself.
#[derive(Default)]
pub struct ExecOptions {
    /// Keyword options per function name.
    pub per_function: HashMap<String, CheckOptions>,
    /// When present, only functions named here run.
    pub subset: Option<HashSet<String>>,
    pub mode: Option<ExecMode>,
}

/// Runs discovered check functions against one model.
///
/// Failure isolation is the core contract: a function that errors, panics,
/// or returns malformed rows contributes synthetic rows and the run
/// continues. The executor never aborts a job over a plugin.
pub struct CheckExecutor;

impl CheckExecutor {
    pub fn run(
        &self,
        registry: &CheckerRegistry,
        model: &ModelHandle,
        opts: &ExecOptions,
    ) -> Vec<CheckResult> {
        let selected: Vec<&RegisteredCheck> = registry
            .checks()
            .iter()
            .filter(|check| match &opts.subset {
                Some(subset) => subset.contains(&check.name),
                None => true,
            })
            .collect();

        match opts.mode.unwrap_or(ExecMode::Sequential) {
            ExecMode::Sequential => selected
                .iter()
                .flat_map(|check| run_one(check, model, opts))
                .collect(),
            ExecMode::Parallel { max_workers } => {
                run_partitioned(&selected, model, opts, max_workers.max(1))
            }
        }
    }
}

/// Invoke one function and normalize its output to validated rows.
fn run_one(check: &RegisteredCheck, model: &ModelHandle, opts: &ExecOptions) -> Vec<CheckResult> {
    let empty = CheckOptions::new();
    let options = opts.per_function.get(&check.name).unwrap_or(&empty);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| check.func.execute(model, options)));

    let raw_rows = match outcome {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            tracing::warn!(function = %check.name, error = %e, "check function failed");
            return vec![CheckResult::check_failure(&check.name, e.to_string())];
        }
        Err(payload) => {
            let reason = panic_message(&payload);
            tracing::warn!(function = %check.name, reason = %reason, "check function panicked");
            return vec![CheckResult::check_failure(
                &check.name,
                format!("panic: {}", reason),
            )];
        }
    };

    raw_rows
        .iter()
        .map(|raw| match CheckResult::from_row(raw) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(function = %check.name, error = %e, "rejecting malformed row");
                CheckResult::check_failure(&check.name, format!("malformed row: {}", e))
            }
        })
        .collect()
}

/// Parallel mode: side-effect-free functions fan out over a bounded worker
/// pool, the rest run on the caller's thread. Rows are reassembled in
/// registry order before returning.
fn run_partitioned(
    selected: &[&RegisteredCheck],
    model: &ModelHandle,
    opts: &ExecOptions,
    max_workers: usize,
) -> Vec<CheckResult> {
    use std::sync::Mutex;

    let parallel: Vec<(usize, &RegisteredCheck)> = selected
        .iter()
        .enumerate()
        .filter(|(_, c)| c.func.side_effect_free())
        .map(|(i, c)| (i, *c))
        .collect();
    let sequential: Vec<(usize, &RegisteredCheck)> = selected
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.func.side_effect_free())
        .map(|(i, c)| (i, *c))
        .collect();

    let queue: Mutex<Vec<(usize, &RegisteredCheck)>> = Mutex::new(parallel);
    let collected: Mutex<Vec<(usize, Vec<CheckResult>)>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..max_workers {
            scope.spawn(|| loop {
                let next = queue.lock().expect("worker queue poisoned").pop();
                let Some((index, check)) = next else { break };
                let rows = run_one(check, model, opts);
                collected
                    .lock()
                    .expect("result sink poisoned")
                    .push((index, rows));
            });
        }

        for (index, check) in &sequential {
            let rows = run_one(check, model, opts);
            collected
                .lock()
                .expect("result sink poisoned")
                .push((*index, rows));
        }
    });

    let mut collected = collected.into_inner().expect("result sink poisoned");
    collected.sort_by_key(|(index, _)| *index);
    collected.into_iter().flat_map(|(_, rows)| rows).collect()
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::checks::registry::testing::{FnCheck, StaticSource};
    use crate::internal::checks::registry::{CheckError, PluginSource};
    use crate::internal::checks::result::{CheckStatus, REQUIRED_FIELDS};
    use crate::internal::model::handle::fixtures::simple_model;
    use serde_json::json;

    fn door_count_rows(model: &ModelHandle) -> Vec<serde_json::Value> {
        model
            .by_type("IfcDoor")
            .map(|door| {
                json!({
                    "element_id": door.id,
                    "element_type": "IfcDoor",
                    "element_name": door.name.clone().unwrap_or_default(),
                    "element_name_long": null,
                    "check_status": "pass",
                    "actual_value": "present",
                    "required_value": "present",
                    "comment": null,
                    "log": null
                })
            })
            .collect()
    }

    fn registry_from(source: StaticSource) -> CheckerRegistry {
        let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(source)];
        CheckerRegistry::discover(&sources)
    }

    #[test]
    fn door_rows_then_one_failure_row_for_the_raising_check() {
        let arch = StaticSource::new("arch").with_module(
            "checks/checker_doors.py",
            vec![FnCheck::new("check_door_count", |model, _| {
                Ok(door_count_rows(model))
            })],
        );
        let qa = StaticSource::new("qa").with_module(
            "checks/checker_smoke.py",
            vec![FnCheck::new("check_always_fails", |_, _| {
                Err(CheckError("intentional failure".to_string()))
            })],
        );
        let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(qa), Box::new(arch)];
        let registry = CheckerRegistry::discover(&sources);
        let model = simple_model();

        let rows = CheckExecutor.run(&registry, &model, &ExecOptions::default());

        // Two door rows in registry order, then exactly one synthetic row.
        assert_eq!(rows.len(), 3);
        assert!(rows[..2]
            .iter()
            .all(|r| r.element_type == "IfcDoor" && r.check_status == CheckStatus::Pass));
        assert_eq!(rows[2].element_name, "check_always_fails");
        assert_eq!(rows[2].check_status, CheckStatus::Blocked);
        assert!(rows[2].log.as_deref().unwrap().contains("intentional failure"));
    }

    #[test]
    fn a_panicking_check_is_isolated() {
        let source = StaticSource::new("core").with_module(
            "checks/checker_doors.py",
            vec![
                FnCheck::new("check_a_panics", |_, _| panic!("plugin blew up")),
                FnCheck::new("check_door_count", |model, _| Ok(door_count_rows(model))),
            ],
        );
        let registry = registry_from(source);
        let rows = CheckExecutor.run(&registry, &simple_model(), &ExecOptions::default());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].check_status, CheckStatus::Blocked);
        assert!(rows[0].log.as_deref().unwrap().contains("plugin blew up"));
        assert_eq!(rows[1].element_type, "IfcDoor");
    }

    #[test]
    fn a_row_missing_element_type_becomes_a_synthetic_error_row() {
        let source = StaticSource::new("core").with_module(
            "checks/checker_walls.py",
            vec![FnCheck::new("check_wall_rating", |_, _| {
                Ok(vec![json!({
                    "element_id": "w-1",
                    "element_name": "Wall 1",
                    "element_name_long": null,
                    "check_status": "pass",
                    "actual_value": "REI60",
                    "required_value": "REI60",
                    "comment": null,
                    "log": null
                })])
            })],
        );
        let registry = registry_from(source);
        let rows = CheckExecutor.run(&registry, &simple_model(), &ExecOptions::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].check_status, CheckStatus::Blocked);
        assert_eq!(rows[0].element_name, "check_wall_rating");
        assert!(rows[0].log.as_deref().unwrap().contains("element_type"));
    }

    #[test]
    fn every_produced_row_carries_all_nine_keys() {
        let source = StaticSource::new("core").with_module(
            "checks/checker_doors.py",
            vec![
                FnCheck::new("check_door_count", |model, _| Ok(door_count_rows(model))),
                FnCheck::new("check_bad_status", |_, _| {
                    Ok(vec![json!({
                        "element_id": null,
                        "element_type": "Summary",
                        "element_name": "weird",
                        "element_name_long": null,
                        "check_status": "maybe",
                        "actual_value": "x",
                        "required_value": "y",
                        "comment": null,
                        "log": null
                    })])
                }),
            ],
        );
        let registry = registry_from(source);
        let rows = CheckExecutor.run(&registry, &simple_model(), &ExecOptions::default());

        for row in &rows {
            let value = serde_json::to_value(row).unwrap();
            let map = value.as_object().unwrap();
            for field in REQUIRED_FIELDS {
                assert!(map.contains_key(*field));
            }
        }
    }

    #[test]
    fn subset_filter_limits_execution() {
        let source = StaticSource::new("core").with_module(
            "checks/checker_doors.py",
            vec![
                FnCheck::new("check_door_count", |model, _| Ok(door_count_rows(model))),
                FnCheck::new("check_always_fails", |_, _| {
                    Err(CheckError("should not run".to_string()))
                }),
            ],
        );
        let registry = registry_from(source);

        let opts = ExecOptions {
            subset: Some(
                ["check_door_count".to_string()].into_iter().collect(),
            ),
            ..Default::default()
        };
        let rows = CheckExecutor.run(&registry, &simple_model(), &opts);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.element_type == "IfcDoor"));
    }

    #[test]
    fn per_function_options_reach_the_function() {
        let source = StaticSource::new("core").with_module(
            "checks/checker_doors.py",
            vec![FnCheck::new("check_door_count", |model, options| {
                let min_doors = options
                    .get("min_doors")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1) as usize;
                let found = model.by_type("IfcDoor").count();
                let status = if found >= min_doors { "pass" } else { "fail" };
                Ok(vec![json!({
                    "element_id": null,
                    "element_type": "Summary",
                    "element_name": "Door Count",
                    "element_name_long": null,
                    "check_status": status,
                    "actual_value": found.to_string(),
                    "required_value": format!(">= {}", min_doors),
                    "comment": null,
                    "log": null
                })])
            })],
        );
        let registry = registry_from(source);

        let mut per_function = HashMap::new();
        per_function.insert(
            "check_door_count".to_string(),
            json!({"min_doors": 5}).as_object().unwrap().clone(),
        );
        let opts = ExecOptions {
            per_function,
            ..Default::default()
        };
        let rows = CheckExecutor.run(&registry, &simple_model(), &opts);

        assert_eq!(rows[0].check_status, CheckStatus::Fail);
        assert_eq!(rows[0].required_value, ">= 5");
    }

    #[test]
    fn parallel_mode_preserves_registry_order() {
        let source = StaticSource::new("core").with_module(
            "checks/checker_mixed.py",
            vec![
                FnCheck::pure("check_a", |_, _| {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    Ok(vec![summary_row("check_a")])
                }),
                FnCheck::new("check_b", |_, _| Ok(vec![summary_row("check_b")])),
                FnCheck::pure("check_c", |_, _| Ok(vec![summary_row("check_c")])),
            ],
        );
        let registry = registry_from(source);

        let opts = ExecOptions {
            mode: Some(ExecMode::Parallel { max_workers: 2 }),
            ..Default::default()
        };
        let rows = CheckExecutor.run(&registry, &simple_model(), &opts);

        let names: Vec<&str> = rows.iter().map(|r| r.element_name.as_str()).collect();
        assert_eq!(names, vec!["check_a", "check_b", "check_c"]);
    }

    fn summary_row(name: &str) -> serde_json::Value {
        json!({
            "element_id": null,
            "element_type": "Summary",
            "element_name": name,
            "element_name_long": null,
            "check_status": "pass",
            "actual_value": "1",
            "required_value": "1",
            "comment": null,
            "log": null
        })
    }
}
