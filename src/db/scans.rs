// src/db/scans.rs
//
// Scan request accounting: the per-agency-per-hour throttle counter and
// the scan_runs history rows the workers write.

use rusqlite::{params, Connection};
use serde::Serialize;
use time::OffsetDateTime;

use crate::db::plans;
use crate::errors::ServerError;

#[derive(Debug, Serialize)]
pub struct ScanRun {
    pub id: i64,
    pub agency_id: i64,
    pub provider: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub pages_fetched: Option<i64>,
    pub listings_seen: Option<i64>,
    pub listings_new: Option<i64>,
    pub listings_duplicate: Option<i64>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
}

/// Start of the current clock hour (UTC) for 'now'.
fn start_of_hour(now: i64) -> i64 {
    let dt = OffsetDateTime::from_unix_timestamp(now).unwrap_or_else(|_| OffsetDateTime::now_utc());

    dt.replace_time(time::Time::from_hms(dt.hour(), 0, 0).unwrap_or(time::Time::MIDNIGHT))
        .unix_timestamp()
}

/// Counts scan requests for the agency in the current clock hour (UTC).
pub fn count_scans_this_hour(
    conn: &Connection,
    agency_id: i64,
    now: i64,
) -> Result<i64, ServerError> {
    let count: i64 = conn
        .query_row(
            "select count(*) from user_scans where agency_id = ? and created_at >= ?",
            params![agency_id, start_of_hour(now)],
            |r| r.get(0),
        )
        .map_err(|e| ServerError::DbError(format!("count scans failed: {e}")))?;

    Ok(count)
}

/// The throttle guard: rejects once the agency's plan limit for the
/// current hour is used up. A NULL scan_limit means unlimited.
pub fn check_scan_allowed(conn: &Connection, agency_id: i64, now: i64) -> Result<(), ServerError> {
    let plan = plans::get_agency_plan(conn, agency_id)?;

    let Some(limit) = plan.scan_limit else {
        return Ok(());
    };

    let used = count_scans_this_hour(conn, agency_id, now)?;
    if used >= limit {
        return Err(ServerError::TooManyRequests(format!(
            "scan limit reached ({used}/{limit} this hour)"
        )));
    }

    Ok(())
}

/// Records a scan request. Counted by the throttle guard.
pub fn record_scan(
    conn: &Connection,
    agency_id: i64,
    provider: &str,
    filters_json: &str,
    now: i64,
) -> Result<(), ServerError> {
    conn.execute(
        "insert into user_scans (agency_id, provider, filters_json, created_at) values (?, ?, ?, ?)",
        params![agency_id, provider, filters_json, now],
    )
    .map_err(|e| ServerError::DbError(format!("record scan failed: {e}")))?;
    Ok(())
}

pub fn start_scan_run(
    conn: &Connection,
    agency_id: i64,
    provider: &str,
    now: i64,
) -> Result<i64, ServerError> {
    conn.execute(
        "insert into scan_runs (agency_id, provider, started_at, success) values (?, ?, ?, 0)",
        params![agency_id, provider, now],
    )
    .map_err(|e| ServerError::DbError(format!("start scan run failed: {e}")))?;
    Ok(conn.last_insert_rowid())
}

#[allow(clippy::too_many_arguments)]
pub fn end_scan_run(
    conn: &Connection,
    run_id: i64,
    now: i64,
    pages: usize,
    seen: usize,
    new: usize,
    duplicate: usize,
    success: bool,
    error: Option<String>,
) -> Result<(), ServerError> {
    conn.execute(
        "update scan_runs
         set finished_at = ?, pages_fetched = ?, listings_seen = ?,
             listings_new = ?, listings_duplicate = ?, success = ?, error_message = ?
         where id = ?",
        params![now, pages, seen, new, duplicate, success, error, run_id],
    )
    .map_err(|e| ServerError::DbError(format!("end scan run failed: {e}")))?;
    Ok(())
}

pub fn get_recent_scan_runs(
    conn: &Connection,
    agency_id: i64,
) -> Result<Vec<ScanRun>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select id, agency_id, provider, started_at, finished_at, pages_fetched,
                    listings_seen, listings_new, listings_duplicate, success, error_message
             from scan_runs
             where agency_id = ?
             order by started_at desc limit 50",
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map([agency_id], |row| {
            Ok(ScanRun {
                id: row.get(0)?,
                agency_id: row.get(1)?,
                provider: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                pages_fetched: row.get(5)?,
                listings_seen: row.get(6)?,
                listings_new: row.get(7)?,
                listings_duplicate: row.get(8)?,
                success: row.get(9)?,
                error_message: row.get(10)?,
            })
        })
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
    }
    Ok(runs)
}
