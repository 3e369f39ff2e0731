// src/db/searches.rs
//
// Saved searches: one named filter set per row, stored as JSON so the
// filter struct can grow without a schema change.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::domain::filters::ListingFilters;
use crate::errors::ServerError;

#[derive(Debug, Serialize)]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub filters: ListingFilters,
    pub created_at: i64,
}

pub fn create_search(
    conn: &Connection,
    agency_id: i64,
    name: &str,
    filters: &ListingFilters,
    now: i64,
) -> Result<i64, ServerError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 128 {
        return Err(ServerError::BadRequest("invalid search name".into()));
    }

    let filters_json = serde_json::to_string(filters)
        .map_err(|e| ServerError::DbError(format!("encode filters failed: {e}")))?;

    conn.execute(
        "insert into saved_searches (agency_id, name, filters_json, created_at) values (?, ?, ?, ?)",
        params![agency_id, name, filters_json, now],
    )
    .map_err(|e| ServerError::DbError(format!("insert search failed: {e}")))?;

    Ok(conn.last_insert_rowid())
}

pub fn get_search(
    conn: &Connection,
    agency_id: i64,
    search_id: i64,
) -> Result<Option<SavedSearch>, ServerError> {
    let row = conn
        .query_row(
            "select id, name, filters_json, created_at
             from saved_searches
             where id = ? and agency_id = ?",
            params![search_id, agency_id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select search failed: {e}")))?;

    let Some((id, name, filters_json, created_at)) = row else {
        return Ok(None);
    };

    let filters = serde_json::from_str(&filters_json)
        .map_err(|e| ServerError::DbError(format!("decode filters failed: {e}")))?;

    Ok(Some(SavedSearch {
        id,
        name,
        filters,
        created_at,
    }))
}

pub fn list_searches(conn: &Connection, agency_id: i64) -> Result<Vec<SavedSearch>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select id, name, filters_json, created_at
             from saved_searches
             where agency_id = ?
             order by created_at desc",
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map(params![agency_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, i64>(3)?,
            ))
        })
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        let (id, name, filters_json, created_at) =
            r.map_err(|e| ServerError::DbError(e.to_string()))?;
        let filters = serde_json::from_str(&filters_json)
            .map_err(|e| ServerError::DbError(format!("decode filters failed: {e}")))?;
        out.push(SavedSearch {
            id,
            name,
            filters,
            created_at,
        });
    }
    Ok(out)
}

/// Returns true when a search was actually deleted.
pub fn delete_search(
    conn: &Connection,
    agency_id: i64,
    search_id: i64,
) -> Result<bool, ServerError> {
    let removed = conn
        .execute(
            "delete from saved_searches where id = ? and agency_id = ?",
            params![search_id, agency_id],
        )
        .map_err(|e| ServerError::DbError(format!("delete search failed: {e}")))?;

    Ok(removed > 0)
}
