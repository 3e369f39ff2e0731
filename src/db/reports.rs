// src/db/reports.rs
//
// Read-only aggregates for the reporting endpoints, plus the monthly
// export counter backing the plan's export limit.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;
use time::OffsetDateTime;

use crate::errors::ServerError;

#[derive(Debug, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct SellerTypeCount {
    pub seller_type: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct CityStat {
    pub city: String,
    pub listing_count: i64,
    pub avg_price_per_m2: i64,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub total_listings: i64,
    pub new_last_7_days: i64,
    pub by_source: Vec<SourceCount>,
    pub by_seller_type: Vec<SellerTypeCount>,
    pub top_cities: Vec<CityStat>,
}

pub fn summary_report(
    conn: &Connection,
    new_cutoff: NaiveDateTime,
) -> Result<SummaryReport, ServerError> {
    let total_listings: i64 = conn
        .query_row("select count(*) from listings", [], |r| r.get(0))
        .map_err(|e| ServerError::DbError(format!("count listings failed: {e}")))?;

    let new_last_7_days: i64 = conn
        .query_row(
            "select count(*) from listings where first_seen_at >= ?",
            params![new_cutoff],
            |r| r.get(0),
        )
        .map_err(|e| ServerError::DbError(format!("count new listings failed: {e}")))?;

    let mut by_source = Vec::new();
    {
        let mut stmt = conn
            .prepare("select source, count(*) from listings group by source order by count(*) desc")
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| {
                Ok(SourceCount {
                    source: r.get(0)?,
                    count: r.get(1)?,
                })
            })
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        for r in rows {
            by_source.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
    }

    let mut by_seller_type = Vec::new();
    {
        let mut stmt = conn
            .prepare("select seller_type, count(*) from listings group by seller_type")
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| {
                Ok(SellerTypeCount {
                    seller_type: r.get(0)?,
                    count: r.get(1)?,
                })
            })
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        for r in rows {
            by_seller_type.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
    }

    let mut top_cities = Vec::new();
    {
        let mut stmt = conn
            .prepare(
                "select city, count(*), cast(round(avg(price_eur / surface_m2)) as integer)
                 from listings
                 where city is not null and surface_m2 > 0
                 group by city
                 order by count(*) desc
                 limit 10",
            )
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| {
                Ok(CityStat {
                    city: r.get(0)?,
                    listing_count: r.get(1)?,
                    avg_price_per_m2: r.get(2)?,
                })
            })
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        for r in rows {
            top_cities.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
    }

    Ok(SummaryReport {
        total_listings,
        new_last_7_days,
        by_source,
        by_seller_type,
        top_cities,
    })
}

fn start_of_month(now: i64) -> i64 {
    let dt = OffsetDateTime::from_unix_timestamp(now).unwrap_or_else(|_| OffsetDateTime::now_utc());

    dt.replace_day(1)
        .unwrap_or(dt) // Day 1 is valid for every month, so this is just type safety
        .replace_time(time::Time::MIDNIGHT)
        .unix_timestamp()
}

/// Counts XLSX exports for the agency in the current calendar month (UTC).
pub fn count_exports_this_month(
    conn: &Connection,
    agency_id: i64,
    now: i64,
) -> Result<i64, ServerError> {
    let count: i64 = conn
        .query_row(
            "select count(*) from export_events where agency_id = ? and created_at >= ?",
            params![agency_id, start_of_month(now)],
            |r| r.get(0),
        )
        .map_err(|e| ServerError::DbError(format!("count exports failed: {e}")))?;

    Ok(count)
}

/// Records an export event.
pub fn record_export(conn: &Connection, agency_id: i64, now: i64) -> Result<(), ServerError> {
    conn.execute(
        "insert into export_events (agency_id, format, created_at) values (?, 'xlsx', ?)",
        params![agency_id, now],
    )
    .map_err(|e| ServerError::DbError(format!("record export failed: {e}")))?;
    Ok(())
}
