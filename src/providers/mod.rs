mod error;
mod leboncoin;
pub mod models;
mod moteurimmo;
mod retry;
mod scan;

pub use error::ProviderError;
pub use leboncoin::LeboncoinScraper;
pub use moteurimmo::MoteurImmoClient;
pub use scan::{launch_scan, ScanProvider};
