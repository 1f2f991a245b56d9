// crates/cursor-db/src/query.rs
//! Short-lived, timeout-bounded queries against Cursor databases.
//!
//! One connection per query: open read-only with a 5-second busy
//! timeout, execute exactly one parameterised statement, fetch all
//! rows, close. Parameters are always bound, never concatenated.

use commit_story_types::CursorDbError;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// Busy timeout applied to every connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute one parameterised statement and fetch all rows.
///
/// # Errors
/// - `DatabaseNotFound` when the file is missing.
/// - `DatabaseAccess` for open, lock, permission, and timeout failures
///   (busy/locked are marked retriable).
/// - `DatabaseQuery` for syntax, binding, and runtime statement errors,
///   carrying the SQL text and parameters for debugging.
pub fn execute_query(
    db_path: &Path,
    sql: &str,
    params: &[&str],
) -> Result<Vec<Vec<Value>>, CursorDbError> {
    if !db_path.exists() {
        return Err(CursorDbError::DatabaseNotFound {
            path: db_path.to_path_buf(),
        });
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| access_error(db_path, &e))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| access_error(db_path, &e))?;

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| query_error(sql, params, &e))?;

    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(CursorDbError::DatabaseQuery {
            sql: sql.to_string(),
            parameters: format_params(params),
            cause: format!(
                "statement expects {expected} parameters, {} supplied",
                params.len()
            ),
        });
    }

    let column_count = stmt.column_count();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(|e| query_error(sql, params, &e))?;

    let mut out = Vec::new();
    loop {
        match rows.next() {
            Ok(Some(row)) => {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value: Value = row.get(i).map_err(|e| query_error(sql, params, &e))?;
                    values.push(value);
                }
                out.push(values);
            }
            Ok(None) => break,
            Err(e) => return Err(query_error(sql, params, &e)),
        }
    }

    Ok(out)
}

/// Decode a `value` column that may arrive as BLOB or TEXT into UTF-8.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

fn access_error(path: &Path, err: &rusqlite::Error) -> CursorDbError {
    let retriable = matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    );
    CursorDbError::DatabaseAccess {
        path: path.to_path_buf(),
        cause: err.to_string(),
        retriable,
    }
}

fn query_error(sql: &str, params: &[&str], err: &rusqlite::Error) -> CursorDbError {
    CursorDbError::DatabaseQuery {
        sql: sql.to_string(),
        parameters: format_params(params),
        cause: err.to_string(),
    }
}

fn format_params(params: &[&str]) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"))
}
