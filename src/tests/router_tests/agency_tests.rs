// src/tests/router_tests/agency_tests.rs

use serde_json::json;

use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::utils::{body_json, make_db, register_agency, request};

#[test]
fn register_returns_a_working_api_key() {
    let db = make_db("agency_register");

    let key = register_agency(&db, "contact@agence.fr");
    assert!(key.len() >= 40);

    // the key authenticates
    let req = request("GET", "/tags", Some(&key), None);
    let mut resp = handle(req, &db).unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(&mut resp)["tags"], json!([]));
}

#[test]
fn requests_without_key_are_unauthorized() {
    let db = make_db("agency_noauth");

    let req = request("GET", "/listings", None, None);
    match handle(req, &db) {
        Err(ServerError::Unauthorized(_)) => {}
        other => panic!("expected Unauthorized, got {:?}", other.map(|r| r.status())),
    }

    let req = request("GET", "/listings", Some("not-a-real-key"), None);
    match handle(req, &db) {
        Err(ServerError::Unauthorized(_)) => {}
        other => panic!("expected Unauthorized, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn register_rejects_bad_email() {
    let db = make_db("agency_bad_email");

    let req = request(
        "POST",
        "/agencies",
        None,
        Some(json!({ "name": "Agence", "email": "not-an-email" })),
    );
    match handle(req, &db) {
        Err(ServerError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn registering_twice_keeps_one_agency() {
    let db = make_db("agency_twice");

    let key1 = register_agency(&db, "a@b.fr");
    let key2 = register_agency(&db, "a@b.fr");
    assert_ne!(key1, key2); // fresh key each time, same agency

    let count: i64 = db
        .with_conn(|conn| {
            conn.query_row("select count(*) from agencies", [], |r| r.get(0))
                .map_err(|e| ServerError::DbError(e.to_string()))
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn profile_shows_plan_and_usage() {
    let db = make_db("agency_profile");
    let key = register_agency(&db, "contact@agence.fr");

    let mut resp = handle(request("GET", "/agencies/me", Some(&key), None), &db).unwrap();
    let body = body_json(&mut resp);

    assert_eq!(body["agency"]["email"], "contact@agence.fr");
    assert_eq!(body["plan"]["code"], "free");
    assert_eq!(body["plan"]["scan_limit"], 5);
    assert_eq!(body["usage"]["scans_this_hour"], 0);
    assert_eq!(body["usage"]["exports_this_month"], 0);
}

#[test]
fn rotating_invalidates_the_old_key() {
    let db = make_db("agency_rotate");
    let old_key = register_agency(&db, "contact@agence.fr");

    let mut resp = handle(
        request("POST", "/agencies/rotate", Some(&old_key), None),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 201);
    let new_key = body_json(&mut resp)["api_key"].as_str().unwrap().to_string();

    // old key is dead, new key works
    match handle(request("GET", "/agencies/me", Some(&old_key), None), &db) {
        Err(ServerError::Unauthorized(_)) => {}
        other => panic!("expected Unauthorized, got {:?}", other.map(|r| r.status())),
    }
    let resp = handle(request("GET", "/agencies/me", Some(&new_key), None), &db).unwrap();
    assert_eq!(resp.status(), 200);
}

#[test]
fn unknown_route_is_not_found() {
    let db = make_db("agency_404");

    let req = request("GET", "/does-not-exist", None, None);
    match handle(req, &db) {
        Err(ServerError::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|r| r.status())),
    }
}
