use std::time::Duration;

use rand::Rng;

use crate::providers::ProviderError;

pub const MAX_ATTEMPTS: u64 = 5;
pub const MAX_BACKOFF_SECS: u64 = 10;
pub const JITTER_MAX_SECS: u64 = 2;

/// Retry envelope shared by both provider clients: up to 5 attempts,
/// linear backoff capped at 10s, 0-2s of jitter so parallel scans don't
/// hammer a provider in lockstep.
pub fn with_backoff<T, F>(label: &str, mut attempt_fn: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, ProviderError>,
{
    let mut last_err = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let start = std::time::Instant::now();

        match attempt_fn() {
            Ok(v) => {
                if attempt > 1 {
                    eprintln!("✅ {label} succeeded on attempt {attempt} in {:?}", start.elapsed());
                }
                return Ok(v);
            }
            Err(e) => {
                eprintln!(
                    "⚠️ {label} attempt {attempt} failed in {:?}: {e}",
                    start.elapsed()
                );

                last_err = Some(e);

                if attempt < MAX_ATTEMPTS {
                    let base = std::cmp::min(2 * attempt, MAX_BACKOFF_SECS);
                    let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
                    std::thread::sleep(Duration::from_secs(base + jitter));
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ProviderError::Network(format!("{label}: retry loop failed"))))
}
