// src/tests/router_tests/listings_tests.rs

use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::utils::{body_json, make_db, register_agency, request, seed_listing};

#[test]
fn search_filters_and_paginates() {
    let db = make_db("listings_search");
    let key = register_agency(&db, "a@b.fr");

    seed_listing(&db, "leboncoin", "1", 120_000);
    seed_listing(&db, "leboncoin", "2", 280_000);
    seed_listing(&db, "moteurimmo", "3", 450_000);

    // no filters: everything
    let mut resp = handle(request("GET", "/listings", Some(&key), None), &db).unwrap();
    assert_eq!(body_json(&mut resp)["count"], 3);

    // price range
    let mut resp = handle(
        request("GET", "/listings?max_price=300000", Some(&key), None),
        &db,
    )
    .unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["count"], 2);

    // source filter
    let mut resp = handle(
        request("GET", "/listings?source=moteurimmo", Some(&key), None),
        &db,
    )
    .unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["count"], 1);
    assert_eq!(body["listings"][0]["price_eur"], 450_000);

    // paging
    let mut resp = handle(
        request(
            "GET",
            "/listings?sort=price_asc&limit=1&offset=1",
            Some(&key),
            None,
        ),
        &db,
    )
    .unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["count"], 1);
    assert_eq!(body["listings"][0]["price_eur"], 280_000);
}

#[test]
fn malformed_filter_is_bad_request() {
    let db = make_db("listings_bad_filter");
    let key = register_agency(&db, "a@b.fr");

    let req = request("GET", "/listings?min_price=cheap", Some(&key), None);
    match handle(req, &db) {
        Err(ServerError::BadRequest(_)) => {}
        other => panic!("expected BadRequest, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn listing_detail_includes_location_and_price_per_m2() {
    let db = make_db("listings_detail");
    let key = register_agency(&db, "a@b.fr");
    let id = seed_listing(&db, "leboncoin", "42", 250_000);

    let mut resp = handle(
        request("GET", &format!("/listings/{id}"), Some(&key), None),
        &db,
    )
    .unwrap();
    let body = body_json(&mut resp);

    assert_eq!(body["listing"]["city"], "Nantes");
    assert_eq!(body["listing"]["department"], "44");
    assert_eq!(body["listing"]["latitude"], 47.2);
    assert_eq!(body["price_per_m2"], 2500);
    assert_eq!(body["tags"].as_array().unwrap().len(), 0);
}

#[test]
fn missing_listing_is_not_found() {
    let db = make_db("listings_missing");
    let key = register_agency(&db, "a@b.fr");

    let req = request("GET", "/listings/9999", Some(&key), None);
    match handle(req, &db) {
        Err(ServerError::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|r| r.status())),
    }
}
