use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::model::is_blank;
use crate::error::{AppError, FieldError};

pub const KNOWN_INTENTS: [&str; 7] = [
    "create task",
    "toggle completion",
    "edit task",
    "save task",
    "delete task",
    "clear completed",
    "delete all",
];

/// A mutation request, tagged by its `intent` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent")]
pub enum Intent {
    #[serde(rename = "create task")]
    CreateTask { description: String },
    #[serde(rename = "toggle completion")]
    ToggleCompletion {
        id: String,
        /// Value the client saw before toggling.
        #[serde(rename = "isCompleted", deserialize_with = "bool_or_form_string")]
        is_completed: bool,
    },
    #[serde(rename = "edit task")]
    EditTask { id: String },
    #[serde(rename = "save task")]
    SaveTask { id: String, description: String },
    #[serde(rename = "delete task")]
    DeleteTask { id: String },
    #[serde(rename = "clear completed")]
    ClearCompleted,
    #[serde(rename = "delete all")]
    DeleteAll,
}

impl Intent {
    /// Parse and validate a raw submission.
    ///
    /// Unknown or missing tags and missing keys are `BadRequest`; a blank
    /// description is a field-level `Validation` error.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, AppError> {
        let tag = match payload.get("intent") {
            Some(Value::String(s)) => s.as_str(),
            Some(_) => return Err(AppError::BadRequest("intent must be a string".into())),
            None => return Err(AppError::BadRequest("missing intent".into())),
        };
        if !KNOWN_INTENTS.contains(&tag) {
            return Err(AppError::BadRequest(format!("Unknown intent `{}`", tag)));
        }

        let intent: Intent = serde_json::from_value(Value::Object(payload))
            .map_err(|e| AppError::BadRequest(format!("malformed payload: {}", e)))?;
        intent.validate()?;
        Ok(intent)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Intent::CreateTask { .. } => "create task",
            Intent::ToggleCompletion { .. } => "toggle completion",
            Intent::EditTask { .. } => "edit task",
            Intent::SaveTask { .. } => "save task",
            Intent::DeleteTask { .. } => "delete task",
            Intent::ClearCompleted => "clear completed",
            Intent::DeleteAll => "delete all",
        }
    }

    /// Task targeted by a per-item intent.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Intent::ToggleCompletion { id, .. }
            | Intent::EditTask { id }
            | Intent::SaveTask { id, .. }
            | Intent::DeleteTask { id } => Some(id),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        match self {
            Intent::CreateTask { description } | Intent::SaveTask { description, .. }
                if is_blank(description) =>
            {
                Err(AppError::Validation(vec![FieldError::new(
                    "description",
                    "Description is required.",
                )]))
            }
            _ => Ok(()),
        }
    }
}

/// Form submissions send booleans as `"true"` / `"false"`.
fn bool_or_form_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Str(s) => match s.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, got `{}`", other))),
        },
    }
}
