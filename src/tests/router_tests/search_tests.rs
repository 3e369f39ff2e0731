// src/tests/router_tests/search_tests.rs

use serde_json::json;

use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::utils::{body_json, make_db, register_agency, request, seed_listing};

#[test]
fn saved_search_lifecycle() {
    let db = make_db("search_lifecycle");
    let key = register_agency(&db, "a@b.fr");

    seed_listing(&db, "leboncoin", "1", 150_000);
    seed_listing(&db, "leboncoin", "2", 400_000);

    // create
    let mut resp = handle(
        request(
            "POST",
            "/searches",
            Some(&key),
            Some(json!({
                "name": "Nantes < 200k",
                "filters": { "city": "Nantes", "max_price": 200000 }
            })),
        ),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 201);
    let id = body_json(&mut resp)["id"].as_i64().unwrap();

    // list
    let mut resp = handle(request("GET", "/searches", Some(&key), None), &db).unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["searches"].as_array().unwrap().len(), 1);
    assert_eq!(body["searches"][0]["name"], "Nantes < 200k");
    assert_eq!(body["searches"][0]["filters"]["max_price"], 200000);

    // run
    let mut resp = handle(
        request(
            "GET",
            &format!("/searches/{id}/results"),
            Some(&key),
            None,
        ),
        &db,
    )
    .unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["count"], 1);
    assert_eq!(body["listings"][0]["price_eur"], 150_000);

    // delete
    let resp = handle(
        request("DELETE", &format!("/searches/{id}"), Some(&key), None),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 200);

    // running a deleted search 404s
    let req = request(
        "GET",
        &format!("/searches/{id}/results"),
        Some(&key),
        None,
    );
    match handle(req, &db) {
        Err(ServerError::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn searches_are_per_agency() {
    let db = make_db("search_scoped");
    let key_a = register_agency(&db, "a@b.fr");
    let key_b = register_agency(&db, "b@c.fr");

    let mut resp = handle(
        request(
            "POST",
            "/searches",
            Some(&key_a),
            Some(json!({ "name": "veille", "filters": {} })),
        ),
        &db,
    )
    .unwrap();
    let id = body_json(&mut resp)["id"].as_i64().unwrap();

    // agency B cannot see or delete A's search
    let mut resp = handle(request("GET", "/searches", Some(&key_b), None), &db).unwrap();
    assert_eq!(body_json(&mut resp)["searches"], json!([]));

    let req = request("DELETE", &format!("/searches/{id}"), Some(&key_b), None);
    match handle(req, &db) {
        Err(ServerError::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn empty_search_name_is_rejected() {
    let db = make_db("search_bad_name");
    let key = register_agency(&db, "a@b.fr");

    let req = request(
        "POST",
        "/searches",
        Some(&key),
        Some(json!({ "name": "  ", "filters": {} })),
    );
    match handle(req, &db) {
        Err(ServerError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn summary_report_counts_sources() {
    let db = make_db("report_summary");
    let key = register_agency(&db, "a@b.fr");

    seed_listing(&db, "leboncoin", "1", 150_000);
    seed_listing(&db, "leboncoin", "2", 250_000);
    seed_listing(&db, "moteurimmo", "3", 350_000);

    let mut resp = handle(request("GET", "/reports/summary", Some(&key), None), &db).unwrap();
    let body = body_json(&mut resp);

    assert_eq!(body["total_listings"], 3);
    assert_eq!(body["new_last_7_days"], 3);
    assert_eq!(body["by_source"][0]["source"], "leboncoin");
    assert_eq!(body["by_source"][0]["count"], 2);
    assert_eq!(body["top_cities"][0]["city"], "Nantes");
    assert_eq!(body["top_cities"][0]["listing_count"], 3);
}

#[test]
fn export_respects_monthly_limit() {
    let db = make_db("report_export");
    let key = register_agency(&db, "a@b.fr");
    seed_listing(&db, "leboncoin", "1", 150_000);

    // free plan: 4 exports per month
    for _ in 0..4 {
        let resp = handle(
            request("GET", "/reports/export?city=Nantes", Some(&key), None),
            &db,
        )
        .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    let req = request("GET", "/reports/export?city=Nantes", Some(&key), None);
    match handle(req, &db) {
        Err(ServerError::TooManyRequests(_)) => {}
        other => panic!("expected TooManyRequests, got {:?}", other.map(|r| r.status())),
    }
}
