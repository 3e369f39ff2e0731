// src/domain/filters.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::listing::SellerType;
use crate::errors::ServerError;

/// One filter set, shared by three consumers:
/// - `GET /listings` query params,
/// - the `saved_searches.filters_json` column,
/// - the provider clients (location / price / surface / rooms go out as
///   API parameters on a scan).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingFilters {
    pub city: Option<String>,
    pub postal_prefix: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_surface: Option<f64>,
    pub max_surface: Option<f64>,
    pub min_rooms: Option<i64>,
    pub seller_type: Option<SellerType>,
    pub source: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PublishedDesc,
    PriceAsc,
    PriceDesc,
    LastSeenDesc,
}

impl SortKey {
    pub fn order_by(&self) -> &'static str {
        match self {
            SortKey::PublishedDesc => "l.published_at desc",
            SortKey::PriceAsc => "l.price_eur asc",
            SortKey::PriceDesc => "l.price_eur desc",
            SortKey::LastSeenDesc => "l.last_seen_at desc",
        }
    }
}

/// Paging + ordering, never persisted with a saved search.
#[derive(Debug, Clone, Copy)]
pub struct SearchPage {
    pub sort: SortKey,
    pub limit: i64,
    pub offset: i64,
}

impl Default for SearchPage {
    fn default() -> Self {
        Self {
            sort: SortKey::PublishedDesc,
            limit: 50,
            offset: 0,
        }
    }
}

pub const MAX_PAGE_SIZE: i64 = 200;

fn parse_i64(params: &HashMap<String, String>, key: &str) -> Result<Option<i64>, ServerError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ServerError::BadRequest(format!("invalid {key}: {raw}"))),
    }
}

fn parse_f64(params: &HashMap<String, String>, key: &str) -> Result<Option<f64>, ServerError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ServerError::BadRequest(format!("invalid {key}: {raw}"))),
    }
}

impl ListingFilters {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ServerError> {
        let seller_type = match params.get("seller_type") {
            None => None,
            Some(raw) => Some(SellerType::from_str(raw).ok_or_else(|| {
                ServerError::BadRequest(format!("invalid seller_type: {raw}"))
            })?),
        };

        if let Some(prefix) = params.get("postal_prefix") {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(ServerError::BadRequest(format!(
                    "invalid postal_prefix: {prefix}"
                )));
            }
        }

        Ok(Self {
            city: params.get("city").cloned().filter(|s| !s.is_empty()),
            postal_prefix: params.get("postal_prefix").cloned(),
            min_price: parse_i64(params, "min_price")?,
            max_price: parse_i64(params, "max_price")?,
            min_surface: parse_f64(params, "min_surface")?,
            max_surface: parse_f64(params, "max_surface")?,
            min_rooms: parse_i64(params, "min_rooms")?,
            seller_type,
            source: params.get("source").cloned().filter(|s| !s.is_empty()),
            tag: params.get("tag").cloned().filter(|s| !s.is_empty()),
        })
    }

    /// Short human summary for the scan log ("Nantes, 100000-250000€").
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(c) = &self.city {
            parts.push(c.clone());
        }
        if let Some(p) = &self.postal_prefix {
            parts.push(format!("cp {p}*"));
        }
        match (self.min_price, self.max_price) {
            (Some(a), Some(b)) => parts.push(format!("{a}-{b}€")),
            (Some(a), None) => parts.push(format!(">{a}€")),
            (None, Some(b)) => parts.push(format!("<{b}€")),
            (None, None) => {}
        }
        if let Some(s) = self.min_surface {
            parts.push(format!(">{s}m²"));
        }
        if let Some(r) = self.min_rooms {
            parts.push(format!(">{r}p"));
        }
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl SearchPage {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ServerError> {
        let sort = match params.get("sort").map(String::as_str) {
            None | Some("published") => SortKey::PublishedDesc,
            Some("price_asc") => SortKey::PriceAsc,
            Some("price_desc") => SortKey::PriceDesc,
            Some("last_seen") => SortKey::LastSeenDesc,
            Some(other) => {
                return Err(ServerError::BadRequest(format!("invalid sort: {other}")))
            }
        };

        let limit = parse_i64(params, "limit")?
            .unwrap_or(50)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = parse_i64(params, "offset")?.unwrap_or(0).max(0);

        Ok(Self {
            sort,
            limit,
            offset,
        })
    }
}
