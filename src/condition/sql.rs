//! SQL statement builders (MySQL dialect)
//!
//! Values always travel as positional `?` parameters. Identifiers cannot be
//! parameterized, so they are validated against a strict character set and
//! backtick-quoted.

use serde_json::{Number, Value};

use crate::constants::SQL_IDENTIFIER_BYTES_MAX;
use crate::error::{StoreError, StoreResult};
use crate::record::{Conditions, ListOptions, Record, SortSpec};

/// A SQL string and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// Statement text with `?` placeholders
    pub sql: String,
    /// Values bound to the placeholders, in order
    pub params: Vec<Value>,
}

// =============================================================================
// Fragments
// =============================================================================

/// Validate and backtick-quote a table or column name.
///
/// # Errors
/// Returns `Validation` for empty, oversized, or non `[A-Za-z0-9_$]` names.
pub fn quote_identifier(name: &str) -> StoreResult<String> {
    if name.is_empty() {
        return Err(StoreError::validation("identifier cannot be empty"));
    }
    if name.len() > SQL_IDENTIFIER_BYTES_MAX {
        return Err(StoreError::validation(format!(
            "identifier '{name}' exceeds {SQL_IDENTIFIER_BYTES_MAX} bytes"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(StoreError::validation(format!(
            "identifier '{name}' contains illegal characters"
        )));
    }
    Ok(format!("`{name}`"))
}

/// `` `a` = ? AND `b` IS NULL `` plus parameters; empty for no conditions.
///
/// # Errors
/// Returns `Validation` for illegal field names.
pub fn where_clause(conditions: &Conditions) -> StoreResult<(String, Vec<Value>)> {
    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());

    for (field, value) in conditions.iter() {
        let column = quote_identifier(field)?;
        if value.is_null() {
            parts.push(format!("{column} IS NULL"));
        } else {
            parts.push(format!("{column} = ?"));
            params.push(value.clone());
        }
    }

    Ok((parts.join(" AND "), params))
}

/// `` ORDER BY `a` ASC, `b` DESC ``; empty for no sort keys.
///
/// # Errors
/// Returns `Validation` for illegal field names.
pub fn order_by(sort: &SortSpec) -> StoreResult<String> {
    if sort.is_empty() {
        return Ok(String::new());
    }
    let keys = sort
        .iter()
        .map(|(field, direction)| -> StoreResult<String> {
            Ok(format!("{} {}", quote_identifier(field)?, direction.as_sql()))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(format!(" ORDER BY {}", keys.join(", ")))
}

/// `%query%` with LIKE wildcards in `query` escaped.
#[must_use]
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn append_where(sql: &mut String, conditions: &Conditions) -> StoreResult<Vec<Value>> {
    let (clause, params) = where_clause(conditions)?;
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    Ok(params)
}

// =============================================================================
// Statements
// =============================================================================

/// Multi-row `INSERT` sharing one column list.
///
/// # Errors
/// Returns `Validation` for illegal names or rows missing a column.
pub fn insert(table: &str, columns: &[&str], rows: &[&Record]) -> StoreResult<SqlStatement> {
    assert!(!columns.is_empty(), "insert requires columns");
    assert!(!rows.is_empty(), "insert requires rows");

    let quoted = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<StoreResult<Vec<_>>>()?;
    let group = format!("({})", vec!["?"; columns.len()].join(", "));

    let mut params = Vec::with_capacity(columns.len() * rows.len());
    for row in rows {
        for column in columns {
            let value = row.get(*column).ok_or_else(|| {
                StoreError::validation(format!("row is missing column '{column}'"))
            })?;
            params.push(value.clone());
        }
    }

    Ok(SqlStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_identifier(table)?,
            quoted.join(", "),
            vec![group; rows.len()].join(", ")
        ),
        params,
    })
}

/// `SELECT *` with filter, sort, and paging.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn select(table: &str, conditions: &Conditions, options: &ListOptions) -> StoreResult<SqlStatement> {
    let mut sql = format!("SELECT * FROM {}", quote_identifier(table)?);
    let mut params = append_where(&mut sql, conditions)?;
    sql.push_str(&order_by(&options.sort)?);
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::from(options.limit));
    params.push(Value::from(options.offset));
    Ok(SqlStatement { sql, params })
}

/// `SELECT *` returning the first matching row.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn select_one(table: &str, conditions: &Conditions) -> StoreResult<SqlStatement> {
    let mut sql = format!("SELECT * FROM {}", quote_identifier(table)?);
    let params = append_where(&mut sql, conditions)?;
    sql.push_str(" LIMIT 1");
    Ok(SqlStatement { sql, params })
}

/// `SELECT 1 ... LIMIT 1` existence probe.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn exists(table: &str, conditions: &Conditions) -> StoreResult<SqlStatement> {
    let mut sql = format!("SELECT 1 FROM {}", quote_identifier(table)?);
    let params = append_where(&mut sql, conditions)?;
    sql.push_str(" LIMIT 1");
    Ok(SqlStatement { sql, params })
}

/// `SELECT COUNT(*)`.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn count(table: &str, conditions: &Conditions) -> StoreResult<SqlStatement> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table)?);
    let params = append_where(&mut sql, conditions)?;
    Ok(SqlStatement { sql, params })
}

/// `UPDATE ... SET` partial overwrite.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn update(table: &str, data: &Record, conditions: &Conditions) -> StoreResult<SqlStatement> {
    assert!(!data.is_empty(), "update requires data");

    let mut assignments = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len() + conditions.len());
    for (field, value) in data {
        assignments.push(format!("{} = ?", quote_identifier(field)?));
        params.push(value.clone());
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(table)?,
        assignments.join(", ")
    );
    params.extend(append_where(&mut sql, conditions)?);

    // Rows already holding every value do not match, so the affected count
    // is the changed count even with CLIENT_FOUND_ROWS.
    let mut unchanged = Vec::with_capacity(data.len());
    for (field, value) in data {
        unchanged.push(format!("{} <=> ?", quote_identifier(field)?));
        params.push(value.clone());
    }
    sql.push_str(if conditions.is_empty() { " WHERE " } else { " AND " });
    sql.push_str("NOT (");
    sql.push_str(&unchanged.join(" AND "));
    sql.push(')');
    Ok(SqlStatement { sql, params })
}

/// `UPDATE ... SET f = COALESCE(f, 0) + ?` for each delta.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn increment(table: &str, deltas: &[(String, Number)], conditions: &Conditions) -> StoreResult<SqlStatement> {
    assert!(!deltas.is_empty(), "increment requires deltas");

    let mut assignments = Vec::with_capacity(deltas.len());
    let mut params = Vec::with_capacity(deltas.len() + conditions.len());
    for (field, amount) in deltas {
        let column = quote_identifier(field)?;
        assignments.push(format!("{column} = COALESCE({column}, 0) + ?"));
        params.push(Value::Number(amount.clone()));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(table)?,
        assignments.join(", ")
    );
    params.extend(append_where(&mut sql, conditions)?);
    Ok(SqlStatement { sql, params })
}

/// `DELETE FROM`.
///
/// # Errors
/// Returns `Validation` for illegal names.
pub fn delete(table: &str, conditions: &Conditions) -> StoreResult<SqlStatement> {
    let mut sql = format!("DELETE FROM {}", quote_identifier(table)?);
    let params = append_where(&mut sql, conditions)?;
    Ok(SqlStatement { sql, params })
}

/// `SELECT *` where any field is `LIKE %query%`.
///
/// # Errors
/// Returns `Validation` for illegal names or no fields.
pub fn search(table: &str, query: &str, fields: &[&str]) -> StoreResult<SqlStatement> {
    if fields.is_empty() {
        return Err(StoreError::validation("search: fields cannot be empty"));
    }

    let pattern = like_pattern(query);
    let parts = fields
        .iter()
        .map(|f| -> StoreResult<String> { Ok(format!("{} LIKE ?", quote_identifier(f)?)) })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(SqlStatement {
        sql: format!(
            "SELECT * FROM {} WHERE {}",
            quote_identifier(table)?,
            parts.join(" OR ")
        ),
        params: vec![Value::from(pattern); fields.len()],
    })
}
