use std::io::Read;

use serde_json::Value;

use crate::db::connection::{init_db, Database};
use crate::db::listings::save_listings_page;
use crate::domain::listing::{NormalizedListing, SellerType};
use crate::router::handle;

/// Returns a fresh test database using the production schema
pub fn make_db(label: &str) -> Database {
    let path = std::env::temp_dir().join(format!(
        "{label}_{}.sqlite",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path.to_string_lossy().to_string());
    init_db(&db, "sql/schema.sql").expect("Failed to initialize DB");
    db
}

/// Build a request the router accepts. astra's Request is just
/// http::Request with an astra Body.
pub fn request(
    method: &str,
    path: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> astra::Request {
    let mut builder = http::Request::builder().method(method).uri(path);
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {key}"));
    }

    let body = match body {
        Some(v) => astra::Body::from(v.to_string()),
        None => astra::Body::from(""),
    };
    builder.body(body).expect("failed to build request")
}

pub fn body_json(resp: &mut astra::Response) -> Value {
    let mut buf = Vec::new();
    resp.body_mut()
        .reader()
        .read_to_end(&mut buf)
        .expect("failed to read body");
    serde_json::from_slice(&buf).expect("body was not JSON")
}

/// Register an agency through the API and return its key.
pub fn register_agency(db: &Database, email: &str) -> String {
    let req = request(
        "POST",
        "/agencies",
        None,
        Some(serde_json::json!({ "name": "Agence Test", "email": email })),
    );
    let mut resp = handle(req, db).expect("agency registration failed");
    assert_eq!(resp.status(), 201);

    body_json(&mut resp)["api_key"]
        .as_str()
        .expect("missing api_key")
        .to_string()
}

/// Store a listing directly, as a completed scan would.
pub fn seed_listing(db: &Database, source: &str, id: &str, price: i64) -> i64 {
    let listing = NormalizedListing {
        source: source.to_string(),
        source_listing_id: id.to_string(),
        url: format!("https://{source}.example/{id}"),
        title: format!("Maison {id}"),
        description: Some("Belle maison familiale.".to_string()),
        price_eur: price,
        surface_m2: Some(100.0),
        rooms: Some(4),
        city: Some("Nantes".to_string()),
        postal_code: Some("44000".to_string()),
        latitude: Some(47.2),
        longitude: Some(-1.55),
        coord_confidence: Some(0.9),
        images: vec![],
        published_at: None,
        seller_name: None,
        seller_type: SellerType::Private,
    };

    save_listings_page(db, &[listing]).expect("seed failed");

    db.with_conn(|conn| {
        conn.query_row(
            "select id from listings where source = ? and source_listing_id = ?",
            rusqlite::params![source, id],
            |r| r.get(0),
        )
        .map_err(|e| crate::errors::ServerError::DbError(e.to_string()))
    })
    .expect("seeded listing not found")
}
