//! JSON ↔ DynamoDB attribute values
//!
//! Numbers travel as decimal strings. Sets come back as arrays and binary
//! values as base64 strings, so every item decodes into plain JSON.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{Number, Value};

use crate::record::Record;

/// Native item shape.
pub type Item = HashMap<String, AttributeValue>;

/// Convert one JSON value.
#[must_use]
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

fn number_value(text: String) -> Value {
    serde_json::from_str::<Number>(&text).map_or(Value::String(text), Value::Number)
}

fn blob_value(blob: Blob) -> Value {
    Value::String(BASE64.encode(blob.into_inner()))
}

/// Convert one attribute value back into JSON.
#[must_use]
pub fn from_attribute(attribute: AttributeValue) -> Value {
    match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::N(n) => number_value(n),
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::B(blob) => blob_value(blob),
        AttributeValue::L(items) => Value::Array(items.into_iter().map(from_attribute).collect()),
        AttributeValue::M(map) => Value::Object(from_item(map)),
        AttributeValue::Ss(items) => Value::Array(items.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(items) => Value::Array(items.into_iter().map(number_value).collect()),
        AttributeValue::Bs(items) => Value::Array(items.into_iter().map(blob_value).collect()),
        _ => Value::Null,
    }
}

/// Convert a record into an item.
#[must_use]
pub fn to_item(record: &Record) -> Item {
    record
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

/// Convert an item into a record with fields in name order.
#[must_use]
pub fn from_item(item: Item) -> Record {
    let sorted: BTreeMap<String, AttributeValue> = item.into_iter().collect();
    sorted
        .into_iter()
        .map(|(k, v)| (k, from_attribute(v)))
        .collect()
}

/// Convert expression placeholder values.
#[must_use]
pub fn to_attribute_map(values: &BTreeMap<String, Value>) -> HashMap<String, AttributeValue> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}
