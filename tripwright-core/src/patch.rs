//! Partial-document patches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A partial document, used only as input to the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Partial document; keys mirror `TripIntent`
    pub fields: Map<String, Value>,
    /// Who produced the patch, e.g. `trip_requirements_extract`
    pub source: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl Patch {
    pub fn new(source: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            fields,
            source: source.into(),
            note: None,
        }
    }

    /// Build from a JSON value; non-object values produce an empty patch.
    pub fn from_value(source: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(source, fields)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any value in the patch, at any depth, is a sequence.
    pub fn contains_sequence(&self) -> bool {
        fn walk(value: &Value) -> bool {
            match value {
                Value::Array(_) => true,
                Value::Object(map) => map.values().any(walk),
                _ => false,
            }
        }
        self.fields.values().any(walk)
    }
}
