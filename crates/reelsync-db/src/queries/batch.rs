//! Multi-row statement builders shared by the bulk writers.

use rusqlite::types::Value;
use rusqlite::Connection;
use reelsync_common::{Error, Result};

/// Stay under SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` (32766).
const MAX_VARIABLES: usize = 32_000;

/// How many rows of `columns` parameters fit into one statement.
pub(crate) fn rows_per_statement(columns: usize) -> usize {
    (MAX_VARIABLES / columns.max(1)).max(1)
}

/// `(?, ?), (?, ?)` for `rows` tuples of `columns` placeholders.
pub(crate) fn values_placeholders(rows: usize, columns: usize) -> String {
    let tuple = format!("({})", vec!["?"; columns].join(", "));
    vec![tuple.as_str(); rows].join(", ")
}

/// Run a multi-row `INSERT ... VALUES ... <suffix>` and collect whatever the
/// suffix's `RETURNING` clause yields.
///
/// `head` is everything up to and including `VALUES`.
pub(crate) fn insert_returning<T, F>(
    conn: &Connection,
    head: &str,
    suffix: &str,
    columns: usize,
    rows: &[Vec<Value>],
    mut map: F,
) -> Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut out = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(rows_per_statement(columns)) {
        let sql = format!(
            "{head} {} {suffix}",
            values_placeholders(chunk.len(), columns)
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::database(e.to_string()))?;
        let params = chunk.iter().flatten();
        let mut result = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(|e| Error::database(e.to_string()))?;
        while let Some(row) = result.next().map_err(|e| Error::database(e.to_string()))? {
            out.push(map(row).map_err(|e| Error::database(e.to_string()))?);
        }
    }
    Ok(out)
}

/// Run a multi-row `INSERT ... VALUES ... <suffix>` and return affected rows.
pub(crate) fn insert_many(
    conn: &Connection,
    head: &str,
    suffix: &str,
    columns: usize,
    rows: &[Vec<Value>],
) -> Result<usize> {
    let mut affected = 0;
    for chunk in rows.chunks(rows_per_statement(columns)) {
        let sql = format!(
            "{head} {} {suffix}",
            values_placeholders(chunk.len(), columns)
        );
        affected += conn
            .execute(&sql, rusqlite::params_from_iter(chunk.iter().flatten()))
            .map_err(|e| Error::database(e.to_string()))?;
    }
    Ok(affected)
}

/// One column assignment in a keyed `CASE` update.
pub(crate) struct Assign {
    pub column: &'static str,
    /// A NULL value keeps the stored one.
    pub keep_on_null: bool,
}

/// Update many rows in one statement using per-key `CASE` assignments:
///
/// ```sql
/// UPDATE t SET a = CASE id WHEN ?1 THEN ?2 WHEN ?4 THEN ?5 ELSE a END, ...
/// WHERE id IN (?1, ?4)
/// ```
///
/// Each row is `(key, values)` with one value per entry in `assigns`.
/// Numbered parameters let every column reuse the key binding.
pub(crate) fn case_update(
    conn: &Connection,
    table: &str,
    key_column: &str,
    assigns: &[Assign],
    extra_set: &str,
    rows: &[(i64, Vec<Value>)],
) -> Result<usize> {
    let stride = assigns.len() + 1;
    let mut affected = 0;

    for chunk in rows.chunks(rows_per_statement(stride)) {
        let mut sets = Vec::with_capacity(assigns.len() + 1);
        for (col_idx, assign) in assigns.iter().enumerate() {
            let mut case = format!("{} = CASE {key_column}", assign.column);
            for row_idx in 0..chunk.len() {
                let key_param = row_idx * stride + 1;
                let value_param = key_param + col_idx + 1;
                if assign.keep_on_null {
                    case.push_str(&format!(
                        " WHEN ?{key_param} THEN COALESCE(?{value_param}, {})",
                        assign.column
                    ));
                } else {
                    case.push_str(&format!(" WHEN ?{key_param} THEN ?{value_param}"));
                }
            }
            case.push_str(&format!(" ELSE {} END", assign.column));
            sets.push(case);
        }
        if !extra_set.is_empty() {
            sets.push(extra_set.to_string());
        }

        let key_params = (0..chunk.len())
            .map(|row_idx| format!("?{}", row_idx * stride + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} SET {} WHERE {key_column} IN ({key_params})",
            sets.join(", ")
        );

        let keys: Vec<Value> = chunk.iter().map(|(k, _)| Value::Integer(*k)).collect();
        let mut params: Vec<&Value> = Vec::with_capacity(chunk.len() * stride);
        for ((_, values), key) in chunk.iter().zip(&keys) {
            params.push(key);
            params.extend(values.iter());
        }

        affected += conn
            .execute(&sql, rusqlite::params_from_iter(params))
            .map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(affected)
}

/// Convert an optional string into a bindable value.
pub(crate) fn text(value: &Option<String>) -> Value {
    match value {
        Some(v) => Value::Text(v.clone()),
        None => Value::Null,
    }
}

pub(crate) fn int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}
