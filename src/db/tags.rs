// src/db/tags.rs
//
// Tags are per-agency labels on listings. Tagging is idempotent; the
// tag row is created on first use.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::errors::ServerError;

#[derive(Debug, Serialize)]
pub struct TagInfo {
    pub name: String,
    pub listing_count: i64,
}

fn get_or_create_tag(
    conn: &Connection,
    agency_id: i64,
    name: &str,
    now: i64,
) -> Result<i64, ServerError> {
    conn.execute(
        "insert or ignore into tags (agency_id, name, created_at) values (?, ?, ?)",
        params![agency_id, name, now],
    )
    .map_err(|e| ServerError::DbError(format!("insert tag failed: {e}")))?;

    conn.query_row(
        "select id from tags where agency_id = ? and name = ?",
        params![agency_id, name],
        |r| r.get(0),
    )
    .map_err(|e| ServerError::DbError(format!("select tag failed: {e}")))
}

pub fn tag_listing(
    conn: &Connection,
    agency_id: i64,
    listing_id: i64,
    name: &str,
    now: i64,
) -> Result<(), ServerError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 64 {
        return Err(ServerError::BadRequest("invalid tag name".into()));
    }

    let listing_exists: Option<i64> = conn
        .query_row(
            "select id from listings where id = ?",
            params![listing_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select listing failed: {e}")))?;
    if listing_exists.is_none() {
        return Err(ServerError::NotFound);
    }

    let tag_id = get_or_create_tag(conn, agency_id, name, now)?;

    conn.execute(
        "insert or ignore into listing_tags (listing_id, tag_id, created_at) values (?, ?, ?)",
        params![listing_id, tag_id, now],
    )
    .map_err(|e| ServerError::DbError(format!("tag listing failed: {e}")))?;

    Ok(())
}

/// Returns true when a link was actually removed.
pub fn untag_listing(
    conn: &Connection,
    agency_id: i64,
    listing_id: i64,
    name: &str,
) -> Result<bool, ServerError> {
    let removed = conn
        .execute(
            "delete from listing_tags
             where listing_id = ?
               and tag_id in (select id from tags where agency_id = ? and name = ?)",
            params![listing_id, agency_id, name],
        )
        .map_err(|e| ServerError::DbError(format!("untag listing failed: {e}")))?;

    Ok(removed > 0)
}

pub fn listing_tags(
    conn: &Connection,
    agency_id: i64,
    listing_id: i64,
) -> Result<Vec<String>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select t.name from listing_tags lt
             join tags t on t.id = lt.tag_id
             where lt.listing_id = ? and t.agency_id = ?
             order by t.name",
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map(params![listing_id, agency_id], |r| r.get::<_, String>(0))
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
    }
    Ok(out)
}

pub fn agency_tags(conn: &Connection, agency_id: i64) -> Result<Vec<TagInfo>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select t.name, count(lt.listing_id)
             from tags t
             left join listing_tags lt on lt.tag_id = t.id
             where t.agency_id = ?
             group by t.id
             order by t.name",
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map(params![agency_id], |r| {
            Ok(TagInfo {
                name: r.get(0)?,
                listing_count: r.get(1)?,
            })
        })
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
    }
    Ok(out)
}
