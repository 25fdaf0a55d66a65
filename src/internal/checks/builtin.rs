//! Compiled-in `core` namespace checks.
//!
//! These are the stock checks every deployment carries; team-authored
//! checkers arrive through additional plugin sources. They go through the
//! same discovery contract as everything else, presented as native modules
//! under the reserved `checks/` subdirectory.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::internal::checks::registry::{
    CheckError, CheckFunction, CheckOptions, CheckerModule, PluginSource,
};
use crate::internal::model::handle::ModelHandle;

/// Extension used for compiled-in checker modules.
const NATIVE_MODULE_EXT: &str = "native";

/// Plugin source for the stock checks, namespace `core`.
pub struct CoreSource;

impl PluginSource for CoreSource {
    fn namespace(&self) -> &str {
        "core"
    }

    fn module_extension(&self) -> &str {
        NATIVE_MODULE_EXT
    }

    fn modules(&self) -> Vec<CheckerModule> {
        vec![
            CheckerModule::new("checks/checker_spatial.native", || {
                Ok(vec![Arc::new(StoreyNames) as Arc<dyn CheckFunction>])
            }),
            CheckerModule::new("checks/checker_doors.native", || {
                Ok(vec![Arc::new(DoorCount) as Arc<dyn CheckFunction>])
            }),
            CheckerModule::new("checks/checker_walls.native", || {
                Ok(vec![Arc::new(WallFireRating) as Arc<dyn CheckFunction>])
            }),
        ]
    }
}

/// Every storey should carry a name; unnamed storeys get a warning.
/// A trailing summary row reports the storey count.
struct StoreyNames;

impl CheckFunction for StoreyNames {
    fn name(&self) -> &str {
        "check_storey_names"
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute(&self, model: &ModelHandle, _options: &CheckOptions) -> Result<Vec<Value>, CheckError> {
        let storeys: Vec<_> = model.by_type("IfcBuildingStorey").collect();
        let mut rows = Vec::with_capacity(storeys.len() + 1);

        for storey in &storeys {
            let named = storey.name.as_deref().map(|n| !n.is_empty()).unwrap_or(false);
            rows.push(json!({
                "element_id": storey.id,
                "element_type": "IfcBuildingStorey",
                "element_name": storey.name.clone().unwrap_or_else(|| "Unnamed storey".to_string()),
                "element_name_long": storey.long_name,
                "check_status": if named { "pass" } else { "warning" },
                "actual_value": storey.name.clone().unwrap_or_else(|| "No name".to_string()),
                "required_value": "Named storey",
                "comment": if named { Value::Null } else { json!("Storey should have a name for clarity") },
                "log": null
            }));
        }

        rows.push(json!({
            "element_id": null,
            "element_type": "Summary",
            "element_name": "Storey Count Check",
            "element_name_long": null,
            "check_status": if storeys.is_empty() { "fail" } else { "pass" },
            "actual_value": storeys.len().to_string(),
            "required_value": ">= 1 storey",
            "comment": format!("Found {} building storey(s)", storeys.len()),
            "log": null
        }));

        Ok(rows)
    }
}

/// One pass row per door; a fail summary is appended only when the model
/// has fewer doors than `min_doors` (default 1).
struct DoorCount;

impl CheckFunction for DoorCount {
    fn name(&self) -> &str {
        "check_door_count"
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute(&self, model: &ModelHandle, options: &CheckOptions) -> Result<Vec<Value>, CheckError> {
        let min_doors = options
            .get("min_doors")
            .and_then(Value::as_u64)
            .unwrap_or(1) as usize;

        let doors: Vec<_> = model.by_type("IfcDoor").collect();
        let mut rows: Vec<Value> = doors
            .iter()
            .map(|door| {
                json!({
                    "element_id": door.id,
                    "element_type": "IfcDoor",
                    "element_name": door.name.clone().unwrap_or_else(|| "Unnamed door".to_string()),
                    "element_name_long": door.long_name,
                    "check_status": "pass",
                    "actual_value": "present",
                    "required_value": "present",
                    "comment": null,
                    "log": null
                })
            })
            .collect();

        if doors.len() < min_doors {
            rows.push(json!({
                "element_id": null,
                "element_type": "Summary",
                "element_name": "Door Count Check",
                "element_name_long": null,
                "check_status": "fail",
                "actual_value": doors.len().to_string(),
                "required_value": format!(">= {} door(s)", min_doors),
                "comment": format!("Model has {} door(s), expected at least {}", doors.len(), min_doors),
                "log": null
            }));
        }

        Ok(rows)
    }
}

/// Walls must declare a `FireRating` property.
struct WallFireRating;

impl CheckFunction for WallFireRating {
    fn name(&self) -> &str {
        "check_wall_fire_rating"
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute(&self, model: &ModelHandle, _options: &CheckOptions) -> Result<Vec<Value>, CheckError> {
        let rows = model
            .by_type("IfcWall")
            .map(|wall| {
                let rating = wall.properties.get("FireRating");
                json!({
                    "element_id": wall.id,
                    "element_type": "IfcWall",
                    "element_name": wall.name.clone().unwrap_or_else(|| "Unnamed wall".to_string()),
                    "element_name_long": wall.long_name,
                    "check_status": if rating.is_some() { "pass" } else { "fail" },
                    "actual_value": rating.cloned().unwrap_or_else(|| "No FireRating".to_string()),
                    "required_value": "FireRating property present",
                    "comment": if rating.is_some() { Value::Null } else { json!("Assign Pset_WallCommon.FireRating") },
                    "log": null
                })
            })
            .collect();
        Ok(rows)
    }
}
