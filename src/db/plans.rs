// src/db/plans.rs
use rusqlite::{params, Connection};

use crate::errors::ServerError;

pub struct PlanInfo {
    pub code: String,
    pub name: String,
    /// Scans per clock hour; null = unlimited.
    pub scan_limit: Option<i64>,
    /// XLSX exports per calendar month; null = unlimited.
    pub export_limit: Option<i64>,
}

pub fn get_agency_plan(conn: &Connection, agency_id: i64) -> Result<PlanInfo, ServerError> {
    conn.query_row(
        r#"
        select
            p.code,
            p.name,
            p.scan_limit,
            p.export_limit
        from agency_plans ap
        join plans p on p.code = ap.plan_code
        where ap.agency_id = ?
        "#,
        params![agency_id],
        |row| {
            Ok(PlanInfo {
                code: row.get(0)?,
                name: row.get(1)?,
                scan_limit: row.get(2)?,
                export_limit: row.get(3)?,
            })
        },
    )
    .map_err(|e| ServerError::DbError(format!("failed to load agency plan: {e}")))
}
