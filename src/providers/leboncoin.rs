// src/providers/leboncoin.rs
//
// Ad-hoc scraper for the classifieds site. The search pages embed their
// results as JSON in a __NEXT_DATA__ script tag, so parsing is: fetch
// HTML, pull the blob out with a selector, deserialize the ad array.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER};
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::domain::filters::ListingFilters;
use crate::providers::models::ClassifiedAd;
use crate::providers::retry::with_backoff;
use crate::providers::ProviderError;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

const DEFAULT_BASE_URL: &str = "https://www.leboncoin.fr";

// Category 9 = ventes immobilières.
const SALES_CATEGORY: &str = "9";

pub struct LeboncoinScraper {
    client: Client,
    base_url: String,
}

impl LeboncoinScraper {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Same contract as the API client: one callback per parsed page,
    /// stop on empty page / repeated page / 3 consecutive failures.
    pub fn fetch_all_pages<F>(
        &self,
        filters: &ListingFilters,
        mut on_page: F,
    ) -> Result<(), ProviderError>
    where
        F: FnMut(Vec<ClassifiedAd>) -> Result<(), ProviderError>,
    {
        let mut page: u32 = 1;
        let mut consecutive_failures = 0;
        let mut seen_pages = HashSet::new();

        loop {
            eprintln!("📄 leboncoin page {page}");

            match self.fetch_page(filters, page) {
                Ok(ads) => {
                    if ads.is_empty() {
                        eprintln!("🏁 leboncoin: no ads on page {page}, stopping");
                        break;
                    }

                    if !seen_pages.insert(page) {
                        eprintln!("🔁 leboncoin: page {page} already seen, stopping");
                        break;
                    }

                    eprintln!("✅ leboncoin page {page} ({} ads)", ads.len());

                    on_page(ads)?;

                    page += 1;
                    consecutive_failures = 0;
                    // Politeness delay; the site blocks eager crawlers.
                    std::thread::sleep(Duration::from_secs(2));
                }

                Err(e) => {
                    consecutive_failures += 1;
                    eprintln!("⚠️ leboncoin page {page} failed ({consecutive_failures}): {e}");

                    if consecutive_failures >= 3 {
                        return Err(e);
                    }

                    std::thread::sleep(Duration::from_secs(2));
                }
            }
        }

        Ok(())
    }

    fn fetch_page(&self, filters: &ListingFilters, page: u32) -> Result<Vec<ClassifiedAd>, ProviderError> {
        let html = with_backoff(&format!("leboncoin page {page}"), || {
            self.try_fetch_html(filters, page)
        })?;

        let data = Self::extract_next_data(&html)?;
        Self::extract_ads(&data)
    }

    fn try_fetch_html(&self, filters: &ListingFilters, page: u32) -> Result<String, ProviderError> {
        let url = self.build_search_url(filters, page)?;

        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR,fr;q=0.9"));

        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if status.as_u16() == 403 || text.contains("datadome") {
            return Err(ProviderError::Blocked(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!("HTTP {status}")));
        }

        Ok(text)
    }

    fn build_search_url(&self, filters: &ListingFilters, page: u32) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/recherche", self.base_url))
            .map_err(|e| ProviderError::Config(format!("bad base url: {e}")))?;

        {
            let mut q = url.query_pairs_mut();
            q.append_pair("category", SALES_CATEGORY);
            if page > 1 {
                q.append_pair("page", &page.to_string());
            }

            if let Some(city) = &filters.city {
                q.append_pair("locations", city);
            } else if let Some(prefix) = &filters.postal_prefix {
                q.append_pair("locations", prefix);
            }

            // Range params use "min-max" with either side open.
            if filters.min_price.is_some() || filters.max_price.is_some() {
                q.append_pair("price", &range_param(filters.min_price, filters.max_price));
            }
            if filters.min_surface.is_some() || filters.max_surface.is_some() {
                q.append_pair(
                    "square",
                    &range_param(
                        filters.min_surface.map(|s| s as i64),
                        filters.max_surface.map(|s| s as i64),
                    ),
                );
            }
            if let Some(rooms) = filters.min_rooms {
                q.append_pair("rooms", &format!("{rooms}-max"));
            }
        }

        Ok(url)
    }

    fn extract_next_data(html: &str) -> Result<Value, ProviderError> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(r#"script[id="__NEXT_DATA__"]"#)
            .map_err(|e| ProviderError::HtmlParse(e.to_string()))?;

        let element = document
            .select(&selector)
            .next()
            .ok_or(ProviderError::MissingEmbeddedJson)?;

        let json_text = element
            .text()
            .next()
            .ok_or(ProviderError::MissingEmbeddedJson)?;
        serde_json::from_str(json_text).map_err(|e| ProviderError::JsonParse(e.to_string()))
    }

    fn extract_ads(data: &Value) -> Result<Vec<ClassifiedAd>, ProviderError> {
        let arr = data["props"]["pageProps"]["searchData"]["ads"]
            .as_array()
            .ok_or_else(|| ProviderError::UnexpectedShape("searchData.ads missing".to_string()))?;

        let ads: Result<Vec<_>, _> = arr
            .iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect();

        ads.map_err(|e| ProviderError::UnexpectedShape(e.to_string()))
    }
}

fn range_param(min: Option<i64>, max: Option<i64>) -> String {
    format!(
        "{}-{}",
        min.map(|v| v.to_string()).unwrap_or_else(|| "min".into()),
        max.map(|v| v.to_string()).unwrap_or_else(|| "max".into()),
    )
}
