// src/db/agencies.rs
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::ServerError;

#[derive(Debug, Clone)]
pub struct Agency {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Insert the agency if it doesn't exist, then return its id.
/// Email should already be normalized by caller (trim/lowercase).
pub fn register_agency(
    conn: &Connection,
    name: &str,
    email: &str,
    now: i64,
) -> Result<i64, ServerError> {
    conn.execute(
        "insert or ignore into agencies (name, email, created_at) values (?, ?, ?)",
        params![name, email, now],
    )
    .map_err(|e| ServerError::DbError(format!("insert agency failed: {e}")))?;

    let id: i64 = conn
        .query_row(
            "select id from agencies where email = ?",
            params![email],
            |row| row.get(0),
        )
        .map_err(|e| ServerError::DbError(format!("select agency id failed: {e}")))?;

    // Every agency starts on the free plan.
    conn.execute(
        "insert or ignore into agency_plans (agency_id, plan_code, granted_at) values (?, 'free', ?)",
        params![id, now],
    )
    .map_err(|e| ServerError::DbError(format!("grant plan failed: {e}")))?;

    Ok(id)
}

pub fn get_agency(conn: &Connection, id: i64) -> Result<Option<Agency>, ServerError> {
    conn.query_row(
        "select id, name, email from agencies where id = ?",
        params![id],
        |r| {
            Ok(Agency {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
            })
        },
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("select agency failed: {e}")))
}

/// Trim + lowercase, minimal sanity check.
pub fn normalize_email(email: &str) -> Result<String, ServerError> {
    let e = email.trim().to_lowercase();
    if e.is_empty() || !e.contains('@') || e.starts_with('@') || e.ends_with('@') {
        return Err(ServerError::BadRequest("invalid email".into()));
    }
    Ok(e)
}
