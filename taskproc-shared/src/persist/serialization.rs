/// Event storage format
///
/// Persisted events are encoded as attribute items: a small tree of
/// typed values (string, decimal string, boolean, map, list) that any
/// document store can hold. The encoding round-trips every user-visible
/// [`Event`] field:
///
/// - strings are stored as strings
/// - numbers are stored as decimal strings and converted back on read
///   (integral values restore as integers, everything else as floats)
/// - booleans are stored as booleans
/// - nested mappings and lists are preserved
///
/// The composite task id is not stored structurally: on write its
/// segment sequence is flattened into one opaque `:`-separated string
/// ([`crate::task_id::to_composite`]), and reads restore the runtime
/// form.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::models::event::Event;
use crate::task_id;

/// Persistence error
#[derive(Debug, Error)]
pub enum PersistError {
    /// Event could not be encoded into the storage format
    #[error("Failed to encode event: {0}")]
    Encode(String),

    /// Stored item could not be decoded back into an Event
    #[error("Failed to decode event: {0}")]
    Decode(String),
}

/// One typed storage attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    /// String attribute
    S(String),

    /// Decimal attribute, held as its string rendering
    N(String),

    /// Boolean attribute
    Bool(bool),

    /// Nested attribute map
    M(BTreeMap<String, Item>),

    /// Attribute list
    L(Vec<Item>),

    /// Explicit absence
    Null,
}

/// Encodes an event into its storage item
///
/// The task id field is stored in its flattened composite form.
pub fn event_to_item(event: &Event) -> Result<Item, PersistError> {
    let value = serde_json::to_value(event).map_err(|e| PersistError::Encode(e.to_string()))?;
    let mut item = value_to_item(&value);
    if let Item::M(fields) = &mut item {
        fields.insert(
            "task_id".to_string(),
            Item::S(task_id::to_composite(&event.task_id)),
        );
    }
    Ok(item)
}

/// Decodes a storage item back into an event
///
/// The flattened composite task id is restored to its runtime form.
pub fn item_to_event(item: &Item) -> Result<Event, PersistError> {
    let mut value = item_to_value(item);
    let composite = value
        .get("task_id")
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    if let Some(composite) = composite {
        value["task_id"] = JsonValue::String(task_id::from_composite(&composite));
    }
    serde_json::from_value(value).map_err(|e| PersistError::Decode(e.to_string()))
}

fn value_to_item(value: &JsonValue) -> Item {
    match value {
        JsonValue::Null => Item::Null,
        JsonValue::Bool(b) => Item::Bool(*b),
        JsonValue::Number(n) => Item::N(n.to_string()),
        JsonValue::String(s) => Item::S(s.clone()),
        JsonValue::Array(items) => Item::L(items.iter().map(value_to_item).collect()),
        JsonValue::Object(map) => Item::M(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_item(v)))
                .collect(),
        ),
    }
}

fn item_to_value(item: &Item) -> JsonValue {
    match item {
        Item::Null => JsonValue::Null,
        Item::Bool(b) => JsonValue::Bool(*b),
        Item::S(s) => JsonValue::String(s.clone()),
        Item::N(s) => decimal_to_value(s),
        Item::L(items) => JsonValue::Array(items.iter().map(item_to_value).collect()),
        Item::M(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), item_to_value(v)))
                .collect(),
        ),
    }
}

// Integral renderings restore as integers so narrow fields (ports,
// counters) deserialize cleanly; everything else becomes a float.
fn decimal_to_value(rendered: &str) -> JsonValue {
    if let Ok(i) = rendered.parse::<i64>() {
        return JsonValue::from(i);
    }
    match rendered.parse::<f64>() {
        Ok(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Err(_) => JsonValue::String(rendered.to_string()),
    }
}
