// src/auth/api_keys.rs
//
// Request identification. Agencies hold long-lived API keys; only the
// SHA-256 of a key is stored, so a leaked database doesn't leak keys.

use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::token::{generate_token_default, hash_token};
use crate::errors::ServerError;

/// Issue a fresh API key for the agency. The raw key is returned exactly
/// once; afterwards only the hash exists.
pub fn issue_api_key(conn: &Connection, agency_id: i64, now: i64) -> Result<String, ServerError> {
    let raw = generate_token_default();
    let hash = hash_token(&raw);

    conn.execute(
        "insert into api_keys (agency_id, token_hash, created_at) values (?, ?, ?)",
        params![agency_id, hash.as_slice(), now],
    )
    .map_err(|e| ServerError::DbError(format!("insert api key failed: {e}")))?;

    Ok(raw)
}

/// Resolve a bearer key to an agency id. Unknown or revoked keys
/// resolve to None.
pub fn authenticate_key(conn: &Connection, raw_key: &str) -> Result<Option<i64>, ServerError> {
    let hash = hash_token(raw_key);

    conn.query_row(
        "select agency_id from api_keys where token_hash = ? and revoked_at is null",
        params![hash.as_slice()],
        |r| r.get(0),
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("api key lookup failed: {e}")))
}

pub fn revoke_keys(conn: &Connection, agency_id: i64, now: i64) -> Result<(), ServerError> {
    conn.execute(
        "update api_keys set revoked_at = ? where agency_id = ? and revoked_at is null",
        params![now, agency_id],
    )
    .map_err(|e| ServerError::DbError(format!("revoke api keys failed: {e}")))?;
    Ok(())
}
