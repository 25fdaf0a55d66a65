use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields every check result row must carry. A nullable field is still a
/// required key; absence and null are not the same thing at this boundary.
pub const REQUIRED_FIELDS: &[&str] = &[
    "element_id",
    "element_type",
    "element_name",
    "element_name_long",
    "check_status",
    "actual_value",
    "required_value",
    "comment",
    "log",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
    Blocked,
    Log,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Warning => "warning",
            CheckStatus::Blocked => "blocked",
            CheckStatus::Log => "log",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pass" => Some(CheckStatus::Pass),
            "fail" => Some(CheckStatus::Fail),
            "warning" => Some(CheckStatus::Warning),
            "blocked" => Some(CheckStatus::Blocked),
            "log" => Some(CheckStatus::Log),
            _ => None,
        }
    }
}

/// One validated result row. Serialization always emits all nine keys;
/// `None` becomes an explicit JSON null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub element_id: Option<String>,
    pub element_type: String,
    pub element_name: String,
    pub element_name_long: Option<String>,
    pub check_status: CheckStatus,
    pub actual_value: String,
    pub required_value: String,
    pub comment: Option<String>,
    pub log: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("row is not a JSON object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' has the wrong type")]
    WrongType(&'static str),
    #[error("invalid check_status '{0}'")]
    InvalidStatus(String),
}

impl CheckResult {
    /// Validate a loosely typed plugin row into a `CheckResult`.
    ///
    /// All nine keys must be present. `element_id`, `element_name_long`,
    /// `comment` and `log` may be null; the rest must be strings and
    /// `check_status` must be one of the five known values.
    pub fn from_row(row: &Value) -> Result<Self, RowError> {
        let map = row.as_object().ok_or(RowError::NotAnObject)?;

        for field in REQUIRED_FIELDS {
            if !map.contains_key(*field) {
                return Err(RowError::MissingField(field));
            }
        }

        let status_raw = required_string(map, "check_status")?;
        let check_status = CheckStatus::parse(&status_raw)
            .ok_or_else(|| RowError::InvalidStatus(status_raw.clone()))?;

        Ok(CheckResult {
            element_id: nullable_string(map, "element_id")?,
            element_type: required_string(map, "element_type")?,
            element_name: required_string(map, "element_name")?,
            element_name_long: nullable_string(map, "element_name_long")?,
            check_status,
            actual_value: required_string(map, "actual_value")?,
            required_value: required_string(map, "required_value")?,
            comment: nullable_string(map, "comment")?,
            log: nullable_string(map, "log")?,
        })
    }

    /// Synthetic row attributing a failure to a check function. Used when a
    /// function errors out entirely or returns a malformed row; `blocked`
    /// marks "no verdict", reserving `fail` for genuine rule violations.
    pub fn check_failure(function: &str, log: String) -> Self {
        CheckResult {
            element_id: None,
            element_type: "CheckerFailure".to_string(),
            element_name: function.to_string(),
            element_name_long: None,
            check_status: CheckStatus::Blocked,
            actual_value: "error".to_string(),
            required_value: "completed check".to_string(),
            comment: Some(format!("check function {} did not produce a usable result", function)),
            log: Some(log),
        }
    }
}

fn required_string(
    map: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, RowError> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(RowError::WrongType(field)),
        None => Err(RowError::MissingField(field)),
    }
}

fn nullable_string(
    map: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, RowError> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) => Ok(None),
        Some(_) => Err(RowError::WrongType(field)),
        None => Err(RowError::MissingField(field)),
    }
}
