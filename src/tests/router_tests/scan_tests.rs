// src/tests/router_tests/scan_tests.rs
//
// These tests never reach the network: the moteurimmo client refuses to
// start without MOTEURIMMO_API_KEY, so the scan worker fails fast and
// only the bookkeeping paths run.

use serde_json::json;

use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::utils::{body_json, make_db, register_agency, request};

fn scan_body() -> serde_json::Value {
    json!({ "provider": "moteurimmo", "filters": { "city": "Nantes" } })
}

#[test]
fn scan_request_is_accepted_and_recorded() {
    std::env::remove_var("MOTEURIMMO_API_KEY");
    let db = make_db("scan_accepted");
    let key = register_agency(&db, "a@b.fr");

    let mut resp = handle(
        request("POST", "/scans", Some(&key), Some(scan_body())),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 202);

    let body = body_json(&mut resp);
    let run_ids = body["run_ids"].as_array().unwrap();
    assert_eq!(run_ids.len(), 1);

    // run row exists immediately, even while the worker is failing
    let mut resp = handle(request("GET", "/scans/recent", Some(&key), None), &db).unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["runs"].as_array().unwrap().len(), 1);
    assert_eq!(body["runs"][0]["provider"], "moteurimmo");
}

#[test]
fn unknown_provider_is_rejected() {
    let db = make_db("scan_bad_provider");
    let key = register_agency(&db, "a@b.fr");

    let req = request(
        "POST",
        "/scans",
        Some(&key),
        Some(json!({ "provider": "craigslist" })),
    );
    match handle(req, &db) {
        Err(ServerError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn free_plan_is_throttled_after_five_scans() {
    std::env::remove_var("MOTEURIMMO_API_KEY");
    let db = make_db("scan_throttle");
    let key = register_agency(&db, "a@b.fr");

    for _ in 0..5 {
        let resp = handle(
            request("POST", "/scans", Some(&key), Some(scan_body())),
            &db,
        )
        .unwrap();
        assert_eq!(resp.status(), 202);
    }

    let req = request("POST", "/scans", Some(&key), Some(scan_body()));
    match handle(req, &db) {
        Err(ServerError::TooManyRequests(_)) => {}
        other => panic!("expected TooManyRequests, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn throttle_is_per_agency() {
    std::env::remove_var("MOTEURIMMO_API_KEY");
    let db = make_db("scan_throttle_scoped");
    let key_a = register_agency(&db, "a@b.fr");
    let key_b = register_agency(&db, "b@c.fr");

    for _ in 0..5 {
        handle(
            request("POST", "/scans", Some(&key_a), Some(scan_body())),
            &db,
        )
        .unwrap();
    }

    // agency A is out of scans, agency B is not
    assert!(handle(
        request("POST", "/scans", Some(&key_a), Some(scan_body())),
        &db
    )
    .is_err());
    let resp = handle(
        request("POST", "/scans", Some(&key_b), Some(scan_body())),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 202);
}
