use std::net::SocketAddr;

use astra::Server;

use crate::db::connection::{init_db, Database};
use crate::responses::error_to_response;
use crate::router::handle;

mod auth;
mod db;
mod domain;
mod errors;
mod geo;
mod providers;
mod reports;
mod responses;
mod router;

#[cfg(test)]
mod tests;

fn main() {
    // 1️⃣ Create the database handle
    let db_path = std::env::var("IMMO_RADAR_DB").unwrap_or_else(|_| "immo_radar.sqlite3".into());
    let db = Database::new(db_path);

    // 2️⃣ Initialize database from schema.sql
    if let Err(e) = init_db(&db, "sql/schema.sql") {
        eprintln!("❌ Database initialization failed: {e}");
        std::process::exit(1);
    }

    // 3️⃣ Start the server
    let addr_raw = std::env::var("IMMO_RADAR_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let addr: SocketAddr = match addr_raw.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("❌ Invalid IMMO_RADAR_ADDR '{addr_raw}': {e}");
            std::process::exit(1);
        }
    };
    println!("Starting server at http://{addr}");

    let server = Server::bind(&addr).max_workers(8);

    // 4️⃣ Serve requests, passing db handle into closure
    let result = server.serve(move |req, _info| match handle(req, &db) {
        Ok(resp) => resp,
        Err(err) => error_to_response(err),
    });

    if let Err(e) = result {
        eprintln!("Server ended with error: {e}");
    }

    println!("Server shut down cleanly.");
}
