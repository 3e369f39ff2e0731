// src/tests/router_tests/tag_tests.rs

use serde_json::json;

use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::utils::{body_json, make_db, register_agency, request, seed_listing};

#[test]
fn tag_untag_roundtrip() {
    let db = make_db("tags_roundtrip");
    let key = register_agency(&db, "a@b.fr");
    let id = seed_listing(&db, "leboncoin", "1", 200_000);

    // tag
    let mut resp = handle(
        request(
            "POST",
            &format!("/listings/{id}/tags"),
            Some(&key),
            Some(json!({ "name": "a-visiter" })),
        ),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(body_json(&mut resp)["tags"], json!(["a-visiter"]));

    // tagging again is idempotent
    let mut resp = handle(
        request(
            "POST",
            &format!("/listings/{id}/tags"),
            Some(&key),
            Some(json!({ "name": "a-visiter" })),
        ),
        &db,
    )
    .unwrap();
    assert_eq!(body_json(&mut resp)["tags"].as_array().unwrap().len(), 1);

    // listed with usage count
    let mut resp = handle(request("GET", "/tags", Some(&key), None), &db).unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["tags"][0]["name"], "a-visiter");
    assert_eq!(body["tags"][0]["listing_count"], 1);

    // untag
    let resp = handle(
        request(
            "DELETE",
            &format!("/listings/{id}/tags/a-visiter"),
            Some(&key),
            None,
        ),
        &db,
    )
    .unwrap();
    assert_eq!(resp.status(), 200);

    // second delete: nothing left to remove
    let req = request(
        "DELETE",
        &format!("/listings/{id}/tags/a-visiter"),
        Some(&key),
        None,
    );
    match handle(req, &db) {
        Err(ServerError::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn tag_filter_narrows_search() {
    let db = make_db("tags_filter");
    let key = register_agency(&db, "a@b.fr");
    let tagged = seed_listing(&db, "leboncoin", "1", 200_000);
    seed_listing(&db, "leboncoin", "2", 300_000);

    handle(
        request(
            "POST",
            &format!("/listings/{tagged}/tags"),
            Some(&key),
            Some(json!({ "name": "favori" })),
        ),
        &db,
    )
    .unwrap();

    let mut resp = handle(request("GET", "/listings?tag=favori", Some(&key), None), &db).unwrap();
    let body = body_json(&mut resp);
    assert_eq!(body["count"], 1);
    assert_eq!(body["listings"][0]["id"], tagged);
}

#[test]
fn tags_are_per_agency() {
    let db = make_db("tags_scoped");
    let key_a = register_agency(&db, "a@b.fr");
    let key_b = register_agency(&db, "b@c.fr");
    let id = seed_listing(&db, "leboncoin", "1", 200_000);

    handle(
        request(
            "POST",
            &format!("/listings/{id}/tags"),
            Some(&key_a),
            Some(json!({ "name": "favori" })),
        ),
        &db,
    )
    .unwrap();

    // agency B sees no tags on the listing
    let mut resp = handle(
        request("GET", &format!("/listings/{id}"), Some(&key_b), None),
        &db,
    )
    .unwrap();
    assert_eq!(body_json(&mut resp)["tags"], json!([]));

    // and B's tag filter matches nothing
    let mut resp = handle(
        request("GET", "/listings?tag=favori", Some(&key_b), None),
        &db,
    )
    .unwrap();
    assert_eq!(body_json(&mut resp)["count"], 0);
}

#[test]
fn tagging_missing_listing_is_not_found() {
    let db = make_db("tags_missing_listing");
    let key = register_agency(&db, "a@b.fr");

    let req = request(
        "POST",
        "/listings/777/tags",
        Some(&key),
        Some(json!({ "name": "favori" })),
    );
    match handle(req, &db) {
        Err(ServerError::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|r| r.status())),
    }
}
