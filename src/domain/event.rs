use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UNKNOWN: &str = "unknown";

pub const EVENT_KEYS: [&str; 6] = [
    "event_name",
    "description",
    "location",
    "date",
    "registration_required",
    "food_provided",
];

/// Structured fields pulled out of an event email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    pub event_name: String,
    pub description: String,
    pub location: String,
    pub date: String,
    pub registration_required: String,
    pub food_provided: String,
}

impl Default for EventFields {
    fn default() -> Self {
        Self {
            event_name: UNKNOWN.into(),
            description: UNKNOWN.into(),
            location: UNKNOWN.into(),
            date: UNKNOWN.into(),
            registration_required: UNKNOWN.into(),
            food_provided: UNKNOWN.into(),
        }
    }
}

impl EventFields {
    /// Build from a loosely typed JSON object. Missing, null or blank values
    /// become `"unknown"`; non-string scalars are stringified.
    pub fn from_json_object(obj: &Map<String, Value>) -> Self {
        let field = |key: &str| match obj.get(key) {
            None | Some(Value::Null) => UNKNOWN.to_string(),
            Some(Value::String(s)) if s.trim().is_empty() => UNKNOWN.to_string(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Bool(true)) => "yes".to_string(),
            Some(Value::Bool(false)) => "no".to_string(),
            Some(other) => other.to_string(),
        };
        Self {
            event_name: field("event_name"),
            description: field("description"),
            location: field("location"),
            date: field("date"),
            registration_required: field("registration_required"),
            food_provided: field("food_provided"),
        }
    }
}
