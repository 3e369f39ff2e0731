use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Who is selling: a private individual or a professional (agency,
/// promoter, mandatary network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerType {
    Private,
    Professional,
}

impl SellerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerType::Private => "private",
            SellerType::Professional => "professional",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(SellerType::Private),
            "professional" => Some(SellerType::Professional),
            _ => None,
        }
    }
}

/// The one internal listing shape every provider record is mapped into.
/// This is what the dedup/upsert layer stores; `source` +
/// `source_listing_id` is the identity, the URL a secondary one.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedListing {
    pub source: String,
    pub source_listing_id: String,
    pub url: String,

    pub title: String,
    pub description: Option<String>,

    pub price_eur: i64,
    pub surface_m2: Option<f64>,
    pub rooms: Option<i64>,

    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Provider-reported coordinate confidence in [0, 1].
    pub coord_confidence: Option<f64>,

    pub images: Vec<String>,
    pub published_at: Option<NaiveDateTime>,

    pub seller_name: Option<String>,
    pub seller_type: SellerType,
}

/// A stored listing as returned by search and detail queries.
#[derive(Debug, Serialize)]
pub struct ListingRow {
    pub id: i64,
    pub source: String,
    pub source_listing_id: String,
    pub url: String,

    pub title: String,
    pub description: Option<String>,

    pub price_eur: i64,
    pub surface_m2: Option<f64>,
    pub rooms: Option<i64>,

    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub department: Option<String>,

    pub seller_type: SellerType,
    pub seller_name: Option<String>,

    pub images: Vec<String>,
    pub published_at: Option<NaiveDateTime>,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ListingRow {
    /// Price per square meter, rounded to whole euros.
    /// None when the surface is missing or zero.
    pub fn price_per_m2(&self) -> Option<i64> {
        match self.surface_m2 {
            Some(s) if s > 0.0 => Some((self.price_eur as f64 / s).round() as i64),
            _ => None,
        }
    }
}
