// src/providers/scan.rs
//
// Scan orchestration: one background thread per requested scan, one
// scan_runs row per provider so a partial failure stays visible per
// source. Pages stream through normalize -> classify -> upsert as they
// arrive; whatever was stored before a failure stays stored.

use crate::db::connection::Database;
use crate::db::{listings, scans};
use crate::domain::filters::ListingFilters;
use crate::domain::listing::NormalizedListing;
use crate::domain::normalize::{
    normalize_classified, normalize_moteurimmo, SOURCE_LEBONCOIN, SOURCE_MOTEURIMMO,
};
use crate::errors::ServerError;
use crate::providers::{LeboncoinScraper, MoteurImmoClient, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProvider {
    MoteurImmo,
    Leboncoin,
    All,
}

impl ScanProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "moteurimmo" => Some(ScanProvider::MoteurImmo),
            "leboncoin" => Some(ScanProvider::Leboncoin),
            "all" => Some(ScanProvider::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanProvider::MoteurImmo => "moteurimmo",
            ScanProvider::Leboncoin => "leboncoin",
            ScanProvider::All => "all",
        }
    }

    fn sources(&self) -> Vec<&'static str> {
        match self {
            ScanProvider::MoteurImmo => vec![SOURCE_MOTEURIMMO],
            ScanProvider::Leboncoin => vec![SOURCE_LEBONCOIN],
            ScanProvider::All => vec![SOURCE_MOTEURIMMO, SOURCE_LEBONCOIN],
        }
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    pages: usize,
    seen: usize,
    new: usize,
    duplicate: usize,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Create the run rows up front (so the caller can hand back run ids in
/// its 202 response), then hand the actual work to a background thread.
/// The Database handle only carries a path, so the clone is cheap.
pub fn launch_scan(
    db: &Database,
    agency_id: i64,
    provider: ScanProvider,
    filters: ListingFilters,
) -> Result<Vec<i64>, ServerError> {
    let now = now_unix();
    let sources = provider.sources();

    let run_ids = db.with_conn(|conn| {
        let mut ids = Vec::new();
        for source in &sources {
            ids.push(scans::start_scan_run(conn, agency_id, source, now)?);
        }
        Ok(ids)
    })?;

    let db = db.clone();
    let jobs: Vec<(&'static str, i64)> = sources.into_iter().zip(run_ids.iter().copied()).collect();

    std::thread::spawn(move || {
        for (source, run_id) in jobs {
            run_one_source(&db, run_id, source, &filters);
        }
    });

    Ok(run_ids)
}

fn run_one_source(db: &Database, run_id: i64, source: &str, filters: &ListingFilters) {
    eprintln!("🧵 scan thread started for {source} ({})", filters.summary());

    let mut counters = RunCounters::default();

    let result = match source {
        SOURCE_MOTEURIMMO => scan_moteurimmo(db, filters, &mut counters),
        SOURCE_LEBONCOIN => scan_leboncoin(db, filters, &mut counters),
        other => Err(ProviderError::Config(format!("unknown source: {other}"))),
    };

    let now = now_unix();
    let (success, error) = match &result {
        Ok(()) => {
            eprintln!(
                "✅ {source} scan complete: {} pages, {} new, {} duplicates",
                counters.pages, counters.new, counters.duplicate
            );
            (true, None)
        }
        Err(e) => {
            eprintln!("❌ {source} scan failed after {} pages: {e}", counters.pages);
            (false, Some(e.to_string()))
        }
    };

    let finalize = db.with_conn(|conn| {
        scans::end_scan_run(
            conn,
            run_id,
            now,
            counters.pages,
            counters.seen,
            counters.new,
            counters.duplicate,
            success,
            error,
        )
    });
    if let Err(e) = finalize {
        eprintln!("⚠️ could not finalize scan run {run_id}: {e}");
    }
}

fn scan_moteurimmo(
    db: &Database,
    filters: &ListingFilters,
    counters: &mut RunCounters,
) -> Result<(), ProviderError> {
    let client = MoteurImmoClient::from_env()?;
    client.fetch_all_pages(filters, |ads| {
        let batch: Vec<NormalizedListing> = ads.iter().filter_map(normalize_moteurimmo).collect();
        store_page(db, &batch, counters)
    })
}

fn scan_leboncoin(
    db: &Database,
    filters: &ListingFilters,
    counters: &mut RunCounters,
) -> Result<(), ProviderError> {
    let scraper = LeboncoinScraper::new()?;
    scraper.fetch_all_pages(filters, |ads| {
        let batch: Vec<NormalizedListing> = ads.iter().filter_map(normalize_classified).collect();
        store_page(db, &batch, counters)
    })
}

fn store_page(
    db: &Database,
    batch: &[NormalizedListing],
    counters: &mut RunCounters,
) -> Result<(), ProviderError> {
    let stats = listings::save_listings_page(db, batch)
        .map_err(|e| ProviderError::Storage(e.to_string()))?;

    counters.pages += 1;
    counters.seen += stats.seen;
    counters.new += stats.new;
    counters.duplicate += stats.duplicate;
    Ok(())
}
