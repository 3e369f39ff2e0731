// src/domain/normalize.rs
//
// Maps each provider's raw record shape into the one internal
// NormalizedListing shape. Records missing a price or a usable identity
// are skipped with a logged reason, never a hard error: one bad ad must
// not sink a page.

use chrono::NaiveDateTime;

use crate::domain::classifier::classify_seller;
use crate::domain::listing::{NormalizedListing, SellerType};
use crate::providers::models::{ClassifiedAd, MoteurImmoAd};

pub const SOURCE_MOTEURIMMO: &str = "moteurimmo";
pub const SOURCE_LEBONCOIN: &str = "leboncoin";

/// Parse a French-formatted price into whole euros.
/// Accepts "249 000 €", "249\u{202f}000 EUR", "249000", "249 000,50 €"
/// (cents are truncated). Returns None for anything without digits.
pub fn parse_price_eur(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00a0}' | '\u{202f}' | '.'))
        .collect();

    // Drop a decimal part ("xxx,50"); prices are stored in whole euros.
    let integer_part = cleaned.split(',').next().unwrap_or("");

    let digits: String = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parse a surface like "85 m²", "85,5 m2" or plain "85".
pub fn parse_surface_m2(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Publication dates arrive either as RFC 3339 ("2026-07-01T10:00:00Z")
/// or as the classifieds' "2026-07-01 10:00:00" form.
fn parse_published_at(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()
}

fn clean_postal(postal: Option<&str>) -> Option<String> {
    let p = postal?.trim().to_string();
    if crate::geo::is_valid_postal_code(&p) {
        Some(p)
    } else {
        None
    }
}

/// Aggregation API record → internal shape.
/// The API sometimes carries its own seller label; when it does we keep
/// it, otherwise the text classifier decides.
pub fn normalize_moteurimmo(ad: &MoteurImmoAd) -> Option<NormalizedListing> {
    let id = match ad.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            eprintln!("Skipping moteurimmo record: missing id");
            return None;
        }
    };

    let price_eur = match ad.price {
        Some(p) if p > 0.0 => p.round() as i64,
        _ => {
            eprintln!("Skipping moteurimmo record {id}: missing price");
            return None;
        }
    };

    let title = ad.title.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() {
        eprintln!("Skipping moteurimmo record {id}: missing title");
        return None;
    }

    let url = ad
        .url
        .clone()
        .unwrap_or_else(|| format!("https://moteurimmo.fr/annonce/{id}"));

    let seller_type = match ad.seller_type.as_deref() {
        Some(s) => SellerType::from_str(s).unwrap_or_else(|| {
            classify_seller(&title, ad.description.as_deref(), ad.seller_name.as_deref())
        }),
        None => classify_seller(&title, ad.description.as_deref(), ad.seller_name.as_deref()),
    };

    Some(NormalizedListing {
        source: SOURCE_MOTEURIMMO.to_string(),
        source_listing_id: id,
        url,
        title,
        description: ad.description.clone(),
        price_eur,
        surface_m2: ad.surface.filter(|s| *s > 0.0),
        rooms: ad.rooms.filter(|r| *r > 0),
        city: ad.city.clone(),
        postal_code: clean_postal(ad.postal_code.as_deref()),
        latitude: ad.latitude,
        longitude: ad.longitude,
        coord_confidence: ad.location_accuracy,
        images: ad.picture_urls.clone(),
        published_at: ad.publication_date.as_deref().and_then(parse_published_at),
        seller_name: ad.seller_name.clone(),
        seller_type,
    })
}

/// Classifieds record (from the embedded search JSON) → internal shape.
/// Rooms and surface live in the free-form attribute list; the owner
/// block carries a "pro"/"private" flag that wins over the classifier
/// when present.
pub fn normalize_classified(ad: &ClassifiedAd) -> Option<NormalizedListing> {
    let id = match ad.list_id {
        Some(id) => id.to_string(),
        None => {
            eprintln!("Skipping classifieds record: missing list_id");
            return None;
        }
    };

    let price_eur = match ad.price.as_ref().and_then(|p| p.first().copied()) {
        Some(p) if p > 0 => p,
        _ => {
            eprintln!("Skipping classifieds record {id}: missing price");
            return None;
        }
    };

    let title = ad.subject.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() {
        eprintln!("Skipping classifieds record {id}: missing subject");
        return None;
    }

    let url = ad
        .url
        .clone()
        .unwrap_or_else(|| format!("https://www.leboncoin.fr/ventes_immobilieres/{id}.htm"));

    let location = ad.location.as_ref();
    let owner = ad.owner.as_ref();
    let seller_name = owner.and_then(|o| o.name.clone());

    let seller_type = match owner.and_then(|o| o.owner_type.as_deref()) {
        Some("pro") => SellerType::Professional,
        Some("private") => SellerType::Private,
        _ => classify_seller(&title, ad.body.as_deref(), seller_name.as_deref()),
    };

    Some(NormalizedListing {
        source: SOURCE_LEBONCOIN.to_string(),
        source_listing_id: id,
        url,
        title,
        description: ad.body.clone(),
        price_eur,
        surface_m2: ad.attribute("square").and_then(parse_surface_m2),
        rooms: ad
            .attribute("rooms")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|r| *r > 0),
        city: location.and_then(|l| l.city.clone()),
        postal_code: clean_postal(location.and_then(|l| l.zipcode.as_deref())),
        latitude: location.and_then(|l| l.lat),
        longitude: location.and_then(|l| l.lng),
        // The site geocodes to the city centroid; treat as approximate.
        coord_confidence: location.and_then(|l| l.lat).map(|_| 0.5),
        images: ad
            .images
            .as_ref()
            .map(|i| i.urls.clone())
            .unwrap_or_default(),
        published_at: ad
            .first_publication_date
            .as_deref()
            .and_then(parse_published_at),
        seller_name,
        seller_type,
    })
}
