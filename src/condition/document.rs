//! MongoDB filter and update documents
//!
//! Condition sets are equality filters already, so they map to a filter
//! document one-to-one. Returned documents are flattened back into plain JSON
//! (ObjectId → hex, DateTime → RFC 3339).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use serde_json::{Number, Value};

use crate::constants::MONGO_ID_FIELD;
use crate::error::{StoreError, StoreResult};
use crate::record::{Conditions, Record, SortSpec};

// =============================================================================
// JSON → BSON
// =============================================================================

/// Convert one JSON value.
///
/// # Errors
/// Returns `Validation` for values BSON cannot represent (u64 above i64::MAX).
pub fn to_bson(value: &Value) -> StoreResult<Bson> {
    bson::to_bson(value).map_err(|e| StoreError::validation(format!("value not representable: {e}")))
}

/// `_id` strings that look like ObjectIds are matched as ObjectIds.
fn field_to_bson(field: &str, value: &Value) -> StoreResult<Bson> {
    if field == MONGO_ID_FIELD {
        if let Value::String(s) = value {
            if let Ok(oid) = ObjectId::parse_str(s) {
                return Ok(Bson::ObjectId(oid));
            }
        }
    }
    to_bson(value)
}

/// Convert a record into a document.
///
/// # Errors
/// Returns `Validation` for unrepresentable values.
pub fn record_to_document(record: &Record) -> StoreResult<Document> {
    let mut document = Document::new();
    for (field, value) in record {
        document.insert(field.clone(), field_to_bson(field, value)?);
    }
    Ok(document)
}

/// Equality filter document.
///
/// # Errors
/// Returns `Validation` for unrepresentable values.
pub fn filter(conditions: &Conditions) -> StoreResult<Document> {
    record_to_document(conditions.as_record())
}

/// `{ field: 1 | -1, ... }` in precedence order.
#[must_use]
pub fn sort(sort: &SortSpec) -> Document {
    let mut document = Document::new();
    for (field, direction) in sort.iter() {
        document.insert(field, direction.as_signum());
    }
    document
}

/// `{ $set: data }`.
///
/// # Errors
/// Returns `Validation` for unrepresentable values.
pub fn set(data: &Record) -> StoreResult<Document> {
    Ok(doc! { "$set": record_to_document(data)? })
}

/// `{ $inc: { field: delta, ... } }`; `$inc` treats a missing field as 0.
///
/// # Errors
/// Returns `Validation` for unrepresentable deltas.
pub fn inc(deltas: &[(String, Number)]) -> StoreResult<Document> {
    let mut fields = Document::new();
    for (field, amount) in deltas {
        fields.insert(field.clone(), to_bson(&Value::Number(amount.clone()))?);
    }
    Ok(doc! { "$inc": fields })
}

/// Escape regex metacharacters so the query matches literally.
#[must_use]
pub fn escape_regex(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `{ $or: [ { field: { $regex, $options: "i" } }, ... ] }`.
///
/// # Errors
/// Returns `Validation` if `fields` is empty.
pub fn search(query: &str, fields: &[&str]) -> StoreResult<Document> {
    if fields.is_empty() {
        return Err(StoreError::validation("search: fields cannot be empty"));
    }
    let pattern = escape_regex(query);
    let clauses: Vec<Bson> = fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
            Bson::Document(clause)
        })
        .collect();
    Ok(doc! { "$or": clauses })
}

// =============================================================================
// BSON → JSON
// =============================================================================

/// Flatten a BSON value into plain JSON.
#[must_use]
pub fn bson_to_value(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map_or_else(|_| Value::from(dt.timestamp_millis()), Value::String),
        Bson::Binary(binary) => Value::String(BASE64.encode(&binary.bytes)),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_value).collect()),
        Bson::Document(document) => Value::Object(document_to_record(document)),
        other => other.into_relaxed_extjson(),
    }
}

/// Flatten a document into a record.
#[must_use]
pub fn document_to_record(document: Document) -> Record {
    document
        .into_iter()
        .map(|(field, value)| (field, bson_to_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::to_record;
    use serde_json::json;

    #[test]
    fn test_filter_is_equality_document() {
        let conditions = Conditions::new().eq("name", "a").eq("balance", 10);
        let document = filter(&conditions).unwrap();
        assert_eq!(document, doc! { "name": "a", "balance": 10_i64 });
    }

    #[test]
    fn test_object_id_conditions() {
        let oid = ObjectId::new();
        let by_oid = filter(&Conditions::new().eq("_id", oid.to_hex())).unwrap();
        assert_eq!(by_oid.get_object_id("_id").unwrap(), oid);

        let by_str = filter(&Conditions::new().eq("_id", "custom-key")).unwrap();
        assert_eq!(by_str.get_str("_id").unwrap(), "custom-key");
    }

    #[test]
    fn test_search_document() {
        let document = search("a.b", &["title", "body"]).unwrap();
        let clauses = document.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[0],
            Bson::Document(doc! { "title": { "$regex": "a\\.b", "$options": "i" } })
        );
        assert!(search("x", &[]).is_err());
    }

    #[test]
    fn test_update_documents() {
        let data = to_record(json!({"isDeleted": true})).unwrap();
        assert_eq!(set(&data).unwrap(), doc! { "$set": { "isDeleted": true } });

        let document = inc(&[("balance".to_string(), Number::from(-5))]).unwrap();
        assert_eq!(document, doc! { "$inc": { "balance": -5_i64 } });
    }

    #[test]
    fn test_sort_document_keeps_order() {
        let document = sort(&SortSpec::new().desc("b").asc("a"));
        let keys: Vec<&String> = document.keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(document.get_i32("b").unwrap(), -1);
    }

    #[test]
    fn test_document_round_trip_flattens_ids() {
        let oid = ObjectId::new();
        let document = doc! { "_id": oid, "name": "a", "n": 3_i32, "f": 1.5 };
        let record = document_to_record(document);

        assert_eq!(record["_id"], json!(oid.to_hex()));
        assert_eq!(record["name"], json!("a"));
        assert_eq!(record["n"], json!(3));
        assert_eq!(record["f"], json!(1.5));
    }
}
