// The event container handed to field extraction: a parsed JSON document
// plus the time the event was observed.

use crate::error::Result;
use crate::pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel returned when a field's path does not exist in the event.
pub const NOT_AVAILABLE: &str = "<NA>";

/// A JSON event with a timestamp in nanoseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEvent {
    /// The parsed event body
    value: Value,
    /// Event time, nanoseconds since epoch
    ts: u64,
}

impl JsonEvent {
    /// Wraps an already parsed JSON value.
    pub fn from_value(value: Value, ts: u64) -> Self {
        JsonEvent { value, ts }
    }

    /// Parses an event body from JSON text.
    pub fn from_json_str(body: &str, ts: u64) -> Result<Self> {
        let value = serde_json::from_str(body)?;
        Ok(JsonEvent { value, ts })
    }

    /// Returns the event body.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the event timestamp in nanoseconds.
    pub fn ts(&self) -> u64 {
        self.ts
    }

    /// Looks up the value at `pointer`, `None` if the path is absent.
    pub fn lookup(&self, pointer: &JsonPointer) -> Option<&Value> {
        pointer.resolve(&self.value)
    }
}

/// Renders a JSON value as text: strings are returned unquoted, everything
/// else in compact JSON form.
pub fn json_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
