// src/providers/moteurimmo.rs
//
// Client for the paid aggregation API. One JSON page per request;
// filters go out as query parameters.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::domain::filters::ListingFilters;
use crate::providers::models::{MoteurImmoAd, MoteurImmoPage};
use crate::providers::retry::with_backoff;
use crate::providers::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.moteurimmo.fr/v1";
const PAGE_SIZE: u32 = 100;

pub struct MoteurImmoClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MoteurImmoClient {
    /// Reads the API key from MOTEURIMMO_API_KEY.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("MOTEURIMMO_API_KEY").map_err(|_| {
            ProviderError::Config("MOTEURIMMO_API_KEY environment variable not set".into())
        })?;
        Self::new(DEFAULT_BASE_URL, api_key)
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Fetch every result page for the filter set, invoking `on_page` as
    /// each page arrives so callers can store partial progress. Stops on
    /// an empty page, a repeated page, the reported last page, or 3
    /// consecutive page failures.
    pub fn fetch_all_pages<F>(
        &self,
        filters: &ListingFilters,
        mut on_page: F,
    ) -> Result<(), ProviderError>
    where
        F: FnMut(Vec<MoteurImmoAd>) -> Result<(), ProviderError>,
    {
        let mut page: u32 = 1;
        let mut consecutive_failures = 0;
        let mut seen_pages = HashSet::new();

        loop {
            eprintln!("📄 moteurimmo page {page}");

            match self.fetch_page(filters, page) {
                Ok(result) => {
                    if result.ads.is_empty() {
                        eprintln!("🏁 moteurimmo: no ads on page {page}, stopping");
                        break;
                    }

                    if !seen_pages.insert(page) {
                        eprintln!("🔁 moteurimmo: page {page} already seen, stopping");
                        break;
                    }

                    let last_page = result.total_pages;
                    eprintln!("✅ moteurimmo page {page} ({} ads)", result.ads.len());

                    on_page(result.ads)?;

                    if let Some(total) = last_page {
                        if page >= total {
                            break;
                        }
                    }

                    page += 1;
                    consecutive_failures = 0;
                    std::thread::sleep(Duration::from_secs(1));
                }

                Err(e) => {
                    consecutive_failures += 1;
                    eprintln!("⚠️ moteurimmo page {page} failed ({consecutive_failures}): {e}");

                    if consecutive_failures >= 3 {
                        return Err(e);
                    }

                    std::thread::sleep(Duration::from_secs(2));
                }
            }
        }

        Ok(())
    }

    fn fetch_page(&self, filters: &ListingFilters, page: u32) -> Result<MoteurImmoPage, ProviderError> {
        with_backoff(&format!("moteurimmo page {page}"), || {
            self.try_fetch_page(filters, page)
        })
    }

    fn try_fetch_page(
        &self,
        filters: &ListingFilters,
        page: u32,
    ) -> Result<MoteurImmoPage, ProviderError> {
        let url = self.build_page_url(filters, page)?;

        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if status.as_u16() == 429 {
            return Err(ProviderError::Blocked(format!("API throttled: {text}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!("HTTP {status}: {text}")));
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::JsonParse(e.to_string()))
    }

    fn build_page_url(&self, filters: &ListingFilters, page: u32) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/listings", self.base_url))
            .map_err(|e| ProviderError::Config(format!("bad base url: {e}")))?;

        {
            let mut q = url.query_pairs_mut();
            q.append_pair("page", &page.to_string());
            q.append_pair("perPage", &PAGE_SIZE.to_string());

            if let Some(city) = &filters.city {
                q.append_pair("city", city);
            }
            if let Some(prefix) = &filters.postal_prefix {
                q.append_pair("postalCodePrefix", prefix);
            }
            if let Some(p) = filters.min_price {
                q.append_pair("minPrice", &p.to_string());
            }
            if let Some(p) = filters.max_price {
                q.append_pair("maxPrice", &p.to_string());
            }
            if let Some(s) = filters.min_surface {
                q.append_pair("minSurface", &s.to_string());
            }
            if let Some(r) = filters.min_rooms {
                q.append_pair("minRooms", &r.to_string());
            }
        }

        Ok(url)
    }
}
