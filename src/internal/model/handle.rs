use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One element of the submitted model, in the simplified listing the
/// upload pipeline produces from the raw IFC file. Parsing the STEP
/// encoding itself happens upstream and is out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelElement {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub ifc_type: String,
    pub name: Option<String>,
    pub long_name: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// The handle check functions receive. Read-only; thread safety of the
/// handle is guaranteed, thread safety of the plugins is not (see the
/// executor's sequential default).
#[derive(Debug, Clone)]
pub struct ModelHandle {
    project: String,
    elements: Vec<ModelElement>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model payload is not usable: {0}")]
    Unusable(String),
}

#[derive(Debug, Deserialize)]
struct ModelPayload {
    elements: Vec<ModelElement>,
}

impl ModelHandle {
    /// Decode the wire payload into a handle. Any shape problem makes the
    /// whole job an error; checks never see an unusable model.
    pub fn decode(payload: &Value, project: &str) -> Result<Self, ModelError> {
        if payload.is_null() {
            return Err(ModelError::Unusable("payload is null".to_string()));
        }
        let parsed: ModelPayload = serde_json::from_value(payload.clone())
            .map_err(|e| ModelError::Unusable(e.to_string()))?;
        Ok(ModelHandle {
            project: project.to_string(),
            elements: parsed.elements,
        })
    }

    pub fn from_elements(project: &str, elements: Vec<ModelElement>) -> Self {
        ModelHandle {
            project: project.to_string(),
            elements,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn elements(&self) -> &[ModelElement] {
        &self.elements
    }

    /// All elements of one IFC type, in model order.
    pub fn by_type<'a>(&'a self, ifc_type: &'a str) -> impl Iterator<Item = &'a ModelElement> {
        self.elements.iter().filter(move |e| e.ifc_type == ifc_type)
    }
}
