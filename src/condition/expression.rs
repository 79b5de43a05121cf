//! DynamoDB expression builders
//!
//! Attribute names always go through `#name` placeholders so reserved words
//! (`name`, `status`, `count`, ...) never clash; values go through `:value`
//! placeholders. Values stay as JSON here and are converted to attribute
//! values by the driver.

use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::error::{StoreError, StoreResult};
use crate::record::{Conditions, Record};

/// An expression string with its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    /// Expression text
    pub text: String,
    /// `#placeholder` → attribute name
    pub names: BTreeMap<String, String>,
    /// `:placeholder` → value
    pub values: BTreeMap<String, Value>,
}

impl Expression {
    /// Whether the expression text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Merge another expression's placeholders into this one, keeping this
    /// expression's text. Placeholder prefixes must not collide.
    pub fn absorb_placeholders(&mut self, other: Expression) {
        self.names.extend(other.names);
        self.values.extend(other.values);
    }
}

fn require_name(field: &str) -> StoreResult<()> {
    if field.is_empty() {
        return Err(StoreError::validation("attribute names cannot be empty"));
    }
    Ok(())
}

/// `#c0 = :c0 AND #c1 = :c1`; `None` for an empty condition set.
///
/// A null expected value matches a missing or NULL attribute.
///
/// # Errors
/// Returns `Validation` for empty attribute names.
pub fn filter(conditions: &Conditions) -> StoreResult<Option<Expression>> {
    if conditions.is_empty() {
        return Ok(None);
    }

    let mut expr = Expression::default();
    let mut parts = Vec::with_capacity(conditions.len());
    for (i, (field, value)) in conditions.iter().enumerate() {
        require_name(field)?;
        let name = format!("#c{i}");
        let placeholder = format!(":c{i}");
        if value.is_null() {
            parts.push(format!("(attribute_not_exists({name}) OR {name} = {placeholder})"));
        } else {
            parts.push(format!("{name} = {placeholder}"));
        }
        expr.names.insert(name, field.clone());
        expr.values.insert(placeholder, value.clone());
    }
    expr.text = parts.join(" AND ");
    Ok(Some(expr))
}

/// `contains(#s0, :q) OR contains(#s1, :q)`.
///
/// # Errors
/// Returns `Validation` if `fields` is empty or a name is empty.
pub fn search(query: &str, fields: &[&str]) -> StoreResult<Expression> {
    if fields.is_empty() {
        return Err(StoreError::validation("search: fields cannot be empty"));
    }

    let mut expr = Expression::default();
    let mut parts = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        require_name(field)?;
        let name = format!("#s{i}");
        parts.push(format!("contains({name}, :q)"));
        expr.names.insert(name, (*field).to_string());
    }
    expr.values.insert(":q".to_string(), Value::from(query));
    expr.text = parts.join(" OR ");
    Ok(expr)
}

/// `SET #u0 = :u0, #u1 = :u1`.
///
/// # Errors
/// Returns `Validation` for empty data or attribute names.
pub fn set(data: &Record) -> StoreResult<Expression> {
    if data.is_empty() {
        return Err(StoreError::validation("update: data cannot be empty"));
    }

    let mut expr = Expression::default();
    let mut parts = Vec::with_capacity(data.len());
    for (i, (field, value)) in data.iter().enumerate() {
        require_name(field)?;
        let name = format!("#u{i}");
        let placeholder = format!(":u{i}");
        parts.push(format!("{name} = {placeholder}"));
        expr.names.insert(name, field.clone());
        expr.values.insert(placeholder, value.clone());
    }
    expr.text = format!("SET {}", parts.join(", "));
    Ok(expr)
}

/// `SET #i0 = if_not_exists(#i0, :zero) + :i0` for each delta.
///
/// # Errors
/// Returns `Validation` for no deltas or empty attribute names.
pub fn increment(deltas: &[(String, Number)]) -> StoreResult<Expression> {
    if deltas.is_empty() {
        return Err(StoreError::validation("increment: deltas cannot be empty"));
    }

    let mut expr = Expression::default();
    let mut parts = Vec::with_capacity(deltas.len());
    for (i, (field, amount)) in deltas.iter().enumerate() {
        require_name(field)?;
        let name = format!("#i{i}");
        let placeholder = format!(":i{i}");
        parts.push(format!("{name} = if_not_exists({name}, :zero) + {placeholder}"));
        expr.names.insert(name, field.clone());
        expr.values.insert(placeholder, Value::Number(amount.clone()));
    }
    expr.values.insert(":zero".to_string(), Value::from(0));
    expr.text = format!("SET {}", parts.join(", "));
    Ok(expr)
}

/// `attribute_exists(#k0) AND attribute_exists(#k1)` guard for key attributes.
///
/// # Panics
/// Panics if `key_attributes` is empty.
#[must_use]
pub fn key_exists(key_attributes: &[String]) -> Expression {
    assert!(!key_attributes.is_empty(), "key schema cannot be empty");

    let mut expr = Expression::default();
    let mut parts = Vec::with_capacity(key_attributes.len());
    for (i, attribute) in key_attributes.iter().enumerate() {
        let name = format!("#k{i}");
        parts.push(format!("attribute_exists({name})"));
        expr.names.insert(name, attribute.clone());
    }
    expr.text = parts.join(" AND ");
    expr
}

/// `a AND b` with merged placeholders.
#[must_use]
pub fn and(a: Expression, b: Expression) -> Expression {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    let mut merged = Expression {
        text: format!("({}) AND ({})", a.text, b.text),
        names: a.names,
        values: a.values,
    };
    merged.names.extend(b.names);
    merged.values.extend(b.values);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::to_record;
    use serde_json::json;

    #[test]
    fn test_filter_uses_name_placeholders() {
        let conditions = Conditions::new().eq("name", "a").eq("status", "open");
        let expr = filter(&conditions).unwrap().unwrap();

        assert_eq!(expr.text, "#c0 = :c0 AND #c1 = :c1");
        assert_eq!(expr.names["#c0"], "name");
        assert_eq!(expr.names["#c1"], "status");
        assert_eq!(expr.values[":c0"], json!("a"));
        assert_eq!(expr.values[":c1"], json!("open"));
    }

    #[test]
    fn test_filter_empty_is_none() {
        assert!(filter(&Conditions::new()).unwrap().is_none());
    }

    #[test]
    fn test_filter_null_matches_missing() {
        let expr = filter(&Conditions::new().eq("deleted", Value::Null))
            .unwrap()
            .unwrap();
        assert_eq!(expr.text, "(attribute_not_exists(#c0) OR #c0 = :c0)");
    }

    #[test]
    fn test_search_expression() {
        let expr = search("rust", &["title", "body"]).unwrap();
        assert_eq!(expr.text, "contains(#s0, :q) OR contains(#s1, :q)");
        assert_eq!(expr.values.len(), 1);
        assert!(search("rust", &[]).is_err());
    }

    #[test]
    fn test_set_and_increment() {
        let data = to_record(json!({"name": "b", "count": 2})).unwrap();
        let expr = set(&data).unwrap();
        assert_eq!(expr.text, "SET #u0 = :u0, #u1 = :u1");

        let expr = increment(&[("balance".to_string(), Number::from(5))]).unwrap();
        assert_eq!(expr.text, "SET #i0 = if_not_exists(#i0, :zero) + :i0");
        assert_eq!(expr.values[":zero"], json!(0));
        assert_eq!(expr.values[":i0"], json!(5));
    }

    #[test]
    fn test_and_merges_placeholders() {
        let cond = filter(&Conditions::new().eq("name", "a")).unwrap().unwrap();
        let guard = key_exists(&["pk".to_string()]);
        let merged = and(cond, guard);

        assert_eq!(merged.text, "(#c0 = :c0) AND (attribute_exists(#k0))");
        assert_eq!(merged.names.len(), 2);
        assert_eq!(merged.values.len(), 1);
    }
}
