use std::collections::HashMap;
use std::io::Read;

use astra::Request;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::auth::api_keys;
use crate::db::connection::Database;
use crate::db::{agencies, listings, plans, reports, scans, searches, tags};
use crate::domain::filters::{ListingFilters, SearchPage};
use crate::errors::ServerError;
use crate::providers::{launch_scan, ScanProvider};
use crate::reports::export_listings_xlsx;
use crate::responses::{json_response, json_response_with_status, ResultResp};

pub fn handle(mut req: Request, db: &Database) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let params = parse_query(&req);

    match (method.as_str(), segments.as_slice()) {
        ("GET", []) => json_response(&json!({
            "service": "immo_radar",
            "status": "ok",
        })),

        ("POST", ["agencies"]) => register_agency(&mut req, db),
        ("GET", ["agencies", "me"]) => agency_profile(&req, db),
        ("POST", ["agencies", "rotate"]) => rotate_api_key(&req, db),

        ("POST", ["scans"]) => start_scan(&mut req, db),
        ("GET", ["scans", "recent"]) => recent_scans(&req, db),

        ("GET", ["listings"]) => list_listings(&req, db, &params),
        ("GET", ["listings", id]) => {
            let id = parse_id(id)?;
            get_listing(&req, db, id)
        }
        ("POST", ["listings", id, "tags"]) => {
            let id = parse_id(id)?;
            add_tag(&mut req, db, id)
        }
        ("DELETE", ["listings", id, "tags", name]) => {
            let id = parse_id(id)?;
            let name = name.to_string();
            remove_tag(&req, db, id, &name)
        }
        ("GET", ["tags"]) => list_tags(&req, db),

        ("POST", ["searches"]) => create_search(&mut req, db),
        ("GET", ["searches"]) => list_searches(&req, db),
        ("DELETE", ["searches", id]) => {
            let id = parse_id(id)?;
            delete_search(&req, db, id)
        }
        ("GET", ["searches", id, "results"]) => {
            let id = parse_id(id)?;
            run_search(&req, db, id, &params)
        }

        ("GET", ["reports", "summary"]) => report_summary(&req, db),
        ("GET", ["reports", "export"]) => report_export(&req, db, &params),

        _ => Err(ServerError::NotFound),
    }
}

fn parse_query(req: &Request) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Some(q) = req.uri().query() {
        for pair in q.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
                map.insert(k.to_string(), v.replace('+', " "));
            }
        }
    }

    map
}

fn parse_id(raw: &str) -> Result<i64, ServerError> {
    raw.parse::<i64>()
        .map_err(|_| ServerError::BadRequest(format!("invalid id: {raw}")))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Read and decode a JSON request body.
fn read_json_body<T: for<'de> Deserialize<'de>>(req: &mut Request) -> Result<T, ServerError> {
    let mut buf = Vec::new();
    req.body_mut()
        .reader()
        .read_to_end(&mut buf)
        .map_err(|e| ServerError::BadRequest(format!("unreadable body: {e}")))?;

    serde_json::from_slice(&buf).map_err(|e| ServerError::BadRequest(format!("invalid body: {e}")))
}

/// Resolve the bearer API key to an agency id.
fn authenticate(req: &Request, db: &Database) -> Result<i64, ServerError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(raw_key) = header.strip_prefix("Bearer ") else {
        return Err(ServerError::Unauthorized("missing bearer api key".into()));
    };

    let agency = db.with_conn(|conn| api_keys::authenticate_key(conn, raw_key.trim()))?;
    agency.ok_or_else(|| ServerError::Unauthorized("invalid api key".into()))
}

// ---- agencies ----

#[derive(Deserialize)]
struct RegisterAgencyBody {
    name: String,
    email: String,
}

fn register_agency(req: &mut Request, db: &Database) -> ResultResp {
    let body: RegisterAgencyBody = read_json_body(req)?;
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ServerError::BadRequest("missing agency name".into()));
    }
    let email = agencies::normalize_email(&body.email)?;
    let now = now_unix();

    let (agency_id, api_key) = db.with_conn(|conn| {
        let agency_id = agencies::register_agency(conn, &name, &email, now)?;
        let api_key = api_keys::issue_api_key(conn, agency_id, now)?;
        Ok((agency_id, api_key))
    })?;

    // The raw key is shown exactly once; only its hash is stored.
    json_response_with_status(
        201,
        &json!({
            "agency_id": agency_id,
            "api_key": api_key,
        }),
    )
}

/// Who am I, what plan am I on, how much of it is used.
fn agency_profile(req: &Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let now = now_unix();

    db.with_conn(|conn| {
        let agency = agencies::get_agency(conn, agency_id)?.ok_or(ServerError::NotFound)?;
        let plan = plans::get_agency_plan(conn, agency_id)?;
        let scans_this_hour = scans::count_scans_this_hour(conn, agency_id, now)?;
        let exports_this_month = reports::count_exports_this_month(conn, agency_id, now)?;

        json_response(&json!({
            "agency": {
                "id": agency.id,
                "name": agency.name,
                "email": agency.email,
            },
            "plan": {
                "code": plan.code,
                "name": plan.name,
                "scan_limit": plan.scan_limit,
                "export_limit": plan.export_limit,
            },
            "usage": {
                "scans_this_hour": scans_this_hour,
                "exports_this_month": exports_this_month,
            },
        }))
    })
}

/// Revoke every live key for the agency and hand out a fresh one.
fn rotate_api_key(req: &Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let now = now_unix();

    let api_key = db.with_conn(|conn| {
        api_keys::revoke_keys(conn, agency_id, now)?;
        api_keys::issue_api_key(conn, agency_id, now)
    })?;

    json_response_with_status(201, &json!({ "api_key": api_key }))
}

// ---- scans ----

#[derive(Deserialize)]
struct ScanBody {
    provider: Option<String>,
    #[serde(default)]
    filters: ListingFilters,
}

fn start_scan(req: &mut Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let body: ScanBody = read_json_body(req)?;

    let provider_raw = body.provider.as_deref().unwrap_or("all");
    let provider = ScanProvider::from_str(provider_raw)
        .ok_or_else(|| ServerError::BadRequest(format!("unknown provider: {provider_raw}")))?;

    let filters_json = serde_json::to_string(&body.filters)
        .map_err(|e| ServerError::DbError(format!("encode filters failed: {e}")))?;
    let now = now_unix();

    // Throttle guard: reject before any work happens, then count the
    // request so retries after a 429 stay counted against the hour.
    db.with_conn(|conn| {
        scans::check_scan_allowed(conn, agency_id, now)?;
        scans::record_scan(conn, agency_id, provider.as_str(), &filters_json, now)
    })?;

    let run_ids = launch_scan(db, agency_id, provider, body.filters)?;

    json_response_with_status(
        202,
        &json!({
            "status": "scanning",
            "run_ids": run_ids,
        }),
    )
}

fn recent_scans(req: &Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let runs = db.with_conn(|conn| scans::get_recent_scan_runs(conn, agency_id))?;
    json_response(&json!({ "runs": runs }))
}

// ---- listings ----

fn list_listings(req: &Request, db: &Database, params: &HashMap<String, String>) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let filters = ListingFilters::from_query(params)?;
    let page = SearchPage::from_query(params)?;

    let rows = listings::search_listings(db, agency_id, &filters, &page)?;
    json_response(&json!({
        "count": rows.len(),
        "listings": rows,
    }))
}

fn get_listing(req: &Request, db: &Database, id: i64) -> ResultResp {
    let agency_id = authenticate(req, db)?;

    let listing = listings::get_listing(db, id)?.ok_or(ServerError::NotFound)?;
    let listing_tags = db.with_conn(|conn| tags::listing_tags(conn, agency_id, id))?;
    let price_per_m2 = listing.price_per_m2();

    json_response(&json!({
        "listing": listing,
        "price_per_m2": price_per_m2,
        "tags": listing_tags,
    }))
}

// ---- tags ----

#[derive(Deserialize)]
struct TagBody {
    name: String,
}

fn add_tag(req: &mut Request, db: &Database, listing_id: i64) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let body: TagBody = read_json_body(req)?;
    let now = now_unix();

    let listing_tags = db.with_conn(|conn| {
        tags::tag_listing(conn, agency_id, listing_id, &body.name, now)?;
        tags::listing_tags(conn, agency_id, listing_id)
    })?;

    json_response_with_status(201, &json!({ "tags": listing_tags }))
}

fn remove_tag(req: &Request, db: &Database, listing_id: i64, name: &str) -> ResultResp {
    let agency_id = authenticate(req, db)?;

    let removed = db.with_conn(|conn| tags::untag_listing(conn, agency_id, listing_id, name))?;
    if !removed {
        return Err(ServerError::NotFound);
    }

    json_response(&json!({ "removed": true }))
}

fn list_tags(req: &Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let all = db.with_conn(|conn| tags::agency_tags(conn, agency_id))?;
    json_response(&json!({ "tags": all }))
}

// ---- saved searches ----

#[derive(Deserialize)]
struct CreateSearchBody {
    name: String,
    #[serde(default)]
    filters: ListingFilters,
}

fn create_search(req: &mut Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let body: CreateSearchBody = read_json_body(req)?;
    let now = now_unix();

    let id =
        db.with_conn(|conn| searches::create_search(conn, agency_id, &body.name, &body.filters, now))?;

    json_response_with_status(201, &json!({ "id": id }))
}

fn list_searches(req: &Request, db: &Database) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let all = db.with_conn(|conn| searches::list_searches(conn, agency_id))?;
    json_response(&json!({ "searches": all }))
}

fn delete_search(req: &Request, db: &Database, id: i64) -> ResultResp {
    let agency_id = authenticate(req, db)?;

    let removed = db.with_conn(|conn| searches::delete_search(conn, agency_id, id))?;
    if !removed {
        return Err(ServerError::NotFound);
    }

    json_response(&json!({ "removed": true }))
}

fn run_search(
    req: &Request,
    db: &Database,
    id: i64,
    params: &HashMap<String, String>,
) -> ResultResp {
    let agency_id = authenticate(req, db)?;

    let saved = db
        .with_conn(|conn| searches::get_search(conn, agency_id, id))?
        .ok_or(ServerError::NotFound)?;
    let page = SearchPage::from_query(params)?;

    let rows = listings::search_listings(db, agency_id, &saved.filters, &page)?;
    json_response(&json!({
        "search": saved,
        "count": rows.len(),
        "listings": rows,
    }))
}

// ---- reports ----

fn report_summary(req: &Request, db: &Database) -> ResultResp {
    // Summary is store-wide; the key only gates access.
    authenticate(req, db)?;

    let cutoff = Utc::now().naive_utc() - Duration::days(7);
    let summary = db.with_conn(|conn| reports::summary_report(conn, cutoff))?;
    json_response(&summary)
}

const EXPORT_MAX_ROWS: i64 = 10_000;

fn report_export(req: &Request, db: &Database, params: &HashMap<String, String>) -> ResultResp {
    let agency_id = authenticate(req, db)?;
    let filters = ListingFilters::from_query(params)?;
    let now = now_unix();

    db.with_conn(|conn| {
        let plan = plans::get_agency_plan(conn, agency_id)?;
        if let Some(limit) = plan.export_limit {
            let used = reports::count_exports_this_month(conn, agency_id, now)?;
            if used >= limit {
                return Err(ServerError::TooManyRequests(format!(
                    "export limit reached ({used}/{limit} this month)"
                )));
            }
        }
        reports::record_export(conn, agency_id, now)
    })?;

    let page = SearchPage {
        limit: EXPORT_MAX_ROWS,
        offset: 0,
        ..Default::default()
    };
    let rows = listings::search_listings(db, agency_id, &filters, &page)?;

    let label = filters
        .city
        .clone()
        .unwrap_or_else(|| "all".to_string())
        .to_lowercase();
    export_listings_xlsx(&rows, &label)
}
