pub mod agencies;
pub mod connection;
pub mod listings;
pub mod plans;
pub mod reports;
pub mod scans;
pub mod searches;
pub mod tags;

pub use connection::Database;
