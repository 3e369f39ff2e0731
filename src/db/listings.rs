use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::db::connection::Database;
use crate::domain::filters::{ListingFilters, SearchPage};
use crate::domain::listing::{ListingRow, NormalizedListing, SellerType};
use crate::errors::ServerError;
use crate::geo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PageSaveStats {
    pub seen: usize,
    pub new: usize,
    pub duplicate: usize,
}

/// Store one provider page. All writes for the page share a transaction
/// so a failure mid-page never leaves half a page behind.
pub fn save_listings_page(
    db: &Database,
    listings: &[NormalizedListing],
) -> Result<PageSaveStats, ServerError> {
    let now = Utc::now().naive_utc();

    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let mut stats = PageSaveStats::default();
        for listing in listings {
            stats.seen += 1;
            match upsert_listing(&tx, listing, now)? {
                UpsertOutcome::Inserted => stats.new += 1,
                UpsertOutcome::Updated => stats.duplicate += 1,
            }
        }

        tx.commit()
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        Ok(stats)
    })
}

/// Dedup check + write for one listing.
///
/// Identity is (source, source_listing_id); the URL is a secondary
/// identity so the aggregator relaying a classifieds ad does not create
/// a second row. A hit refreshes the stored fields and `last_seen_at`;
/// `first_seen_at` never changes after insert.
pub fn upsert_listing(
    tx: &Connection,
    listing: &NormalizedListing,
    now: NaiveDateTime,
) -> Result<UpsertOutcome, ServerError> {
    let existing: Option<i64> = tx
        .query_row(
            "select id from listings
             where (source = ?1 and source_listing_id = ?2) or url = ?3
             limit 1",
            params![listing.source, listing.source_listing_id, listing.url],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("dedup lookup failed: {e}")))?;

    let images_json = serde_json::to_string(&listing.images)
        .map_err(|e| ServerError::DbError(format!("encode images failed: {e}")))?;
    let department = listing
        .postal_code
        .as_deref()
        .and_then(geo::department_from_postal);

    match existing {
        Some(id) => {
            tx.execute(
                r#"
                update listings set
                    title = ?1,
                    description = ?2,
                    price_eur = ?3,
                    surface_m2 = ?4,
                    rooms = ?5,
                    city = ?6,
                    postal_code = ?7,
                    department = ?8,
                    seller_type = ?9,
                    seller_name = ?10,
                    images_json = ?11,
                    published_at = coalesce(?12, published_at),
                    last_seen_at = ?13
                where id = ?14
                "#,
                params![
                    listing.title,
                    listing.description,
                    listing.price_eur,
                    listing.surface_m2,
                    listing.rooms,
                    listing.city,
                    listing.postal_code,
                    department,
                    listing.seller_type.as_str(),
                    listing.seller_name,
                    images_json,
                    listing.published_at,
                    now,
                    id,
                ],
            )
            .map_err(|e| ServerError::DbError(format!("update listing failed: {e}")))?;

            upsert_location(tx, id, listing)?;
            Ok(UpsertOutcome::Updated)
        }

        None => {
            tx.execute(
                r#"
                insert into listings (
                    source, source_listing_id, url,
                    title, description,
                    price_eur, surface_m2, rooms,
                    city, postal_code, department,
                    seller_type, seller_name,
                    images_json, published_at,
                    first_seen_at, last_seen_at
                ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
                params![
                    listing.source,
                    listing.source_listing_id,
                    listing.url,
                    listing.title,
                    listing.description,
                    listing.price_eur,
                    listing.surface_m2,
                    listing.rooms,
                    listing.city,
                    listing.postal_code,
                    department,
                    listing.seller_type.as_str(),
                    listing.seller_name,
                    images_json,
                    listing.published_at,
                    now,
                    now,
                ],
            )
            .map_err(|e| ServerError::DbError(format!("insert listing failed: {e}")))?;

            let id = tx.last_insert_rowid();
            upsert_location(tx, id, listing)?;
            Ok(UpsertOutcome::Inserted)
        }
    }
}

/// One optional location row per listing, provider-sourced only.
fn upsert_location(
    tx: &Connection,
    listing_id: i64,
    listing: &NormalizedListing,
) -> Result<(), ServerError> {
    let (Some(lat), Some(lon)) = (listing.latitude, listing.longitude) else {
        return Ok(());
    };

    tx.execute(
        r#"
        insert into locations (listing_id, lat, lon, confidence, source)
        values (?1, ?2, ?3, ?4, 'provider')
        on conflict(listing_id) do update set
            lat = excluded.lat,
            lon = excluded.lon,
            confidence = excluded.confidence,
            source = excluded.source
        "#,
        params![listing_id, lat, lon, listing.coord_confidence.unwrap_or(1.0)],
    )
    .map_err(|e| ServerError::DbError(format!("upsert location failed: {e}")))?;

    Ok(())
}

const LISTING_COLUMNS: &str = r#"
    l.id, l.source, l.source_listing_id, l.url,
    l.title, l.description,
    l.price_eur, l.surface_m2, l.rooms,
    l.city, l.postal_code, l.department,
    l.seller_type, l.seller_name,
    l.images_json, l.published_at, l.first_seen_at, l.last_seen_at,
    loc.lat, loc.lon
"#;

fn row_to_listing(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListingRow> {
    let seller_type: String = row.get(12)?;
    let images_json: String = row.get(14)?;

    Ok(ListingRow {
        id: row.get(0)?,
        source: row.get(1)?,
        source_listing_id: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        price_eur: row.get(6)?,
        surface_m2: row.get(7)?,
        rooms: row.get(8)?,
        city: row.get(9)?,
        postal_code: row.get(10)?,
        department: row.get(11)?,
        seller_type: SellerType::from_str(&seller_type).unwrap_or(SellerType::Private),
        seller_name: row.get(13)?,
        images: serde_json::from_str(&images_json).unwrap_or_default(),
        published_at: row.get(15)?,
        first_seen_at: row.get(16)?,
        last_seen_at: row.get(17)?,
        latitude: row.get(18)?,
        longitude: row.get(19)?,
    })
}

/// Filtered search over stored listings. The WHERE clause is assembled
/// from whichever filters are set; the tag filter needs the agency id
/// because tags are per-agency.
pub fn search_listings(
    db: &Database,
    agency_id: i64,
    filters: &ListingFilters,
    page: &SearchPage,
) -> Result<Vec<ListingRow>, ServerError> {
    let mut sql = format!(
        "select {LISTING_COLUMNS}
         from listings l
         left join locations loc on loc.listing_id = l.id
         where 1=1"
    );
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    if let Some(city) = &filters.city {
        sql.push_str(&format!(" and lower(l.city) = lower(?{})", values.len() + 1));
        values.push(city.clone().into());
    }
    if let Some(prefix) = &filters.postal_prefix {
        sql.push_str(&format!(" and l.postal_code like ?{}", values.len() + 1));
        values.push(format!("{prefix}%").into());
    }
    if let Some(p) = filters.min_price {
        sql.push_str(&format!(" and l.price_eur >= ?{}", values.len() + 1));
        values.push(p.into());
    }
    if let Some(p) = filters.max_price {
        sql.push_str(&format!(" and l.price_eur <= ?{}", values.len() + 1));
        values.push(p.into());
    }
    if let Some(s) = filters.min_surface {
        sql.push_str(&format!(" and l.surface_m2 >= ?{}", values.len() + 1));
        values.push(s.into());
    }
    if let Some(s) = filters.max_surface {
        sql.push_str(&format!(" and l.surface_m2 <= ?{}", values.len() + 1));
        values.push(s.into());
    }
    if let Some(r) = filters.min_rooms {
        sql.push_str(&format!(" and l.rooms >= ?{}", values.len() + 1));
        values.push(r.into());
    }
    if let Some(t) = filters.seller_type {
        sql.push_str(&format!(" and l.seller_type = ?{}", values.len() + 1));
        values.push(t.as_str().to_string().into());
    }
    if let Some(source) = &filters.source {
        sql.push_str(&format!(" and l.source = ?{}", values.len() + 1));
        values.push(source.clone().into());
    }
    if let Some(tag) = &filters.tag {
        sql.push_str(&format!(
            " and exists (
                 select 1 from listing_tags lt
                 join tags t on t.id = lt.tag_id
                 where lt.listing_id = l.id and t.agency_id = ?{} and t.name = ?{}
             )",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(agency_id.into());
        values.push(tag.clone().into());
    }

    sql.push_str(&format!(
        " order by {} limit ?{} offset ?{}",
        page.sort.order_by(),
        values.len() + 1,
        values.len() + 2
    ));
    values.push(page.limit.into());
    values.push(page.offset.into());

    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ServerError::DbError(format!("prepare search failed: {e}")))?;

        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_listing)
            .map_err(|e| ServerError::DbError(format!("search query failed: {e}")))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
        Ok(results)
    })
}

pub fn get_listing(db: &Database, id: i64) -> Result<Option<ListingRow>, ServerError> {
    db.with_conn(|conn| {
        conn.query_row(
            &format!(
                "select {LISTING_COLUMNS}
                 from listings l
                 left join locations loc on loc.listing_id = l.id
                 where l.id = ?"
            ),
            params![id],
            row_to_listing,
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select listing failed: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::SellerType;

    fn test_db() -> Database {
        let path = std::env::temp_dir().join(format!(
            "listings_test_{}.sqlite",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let db = Database::new(path.to_string_lossy().to_string());
        crate::db::connection::init_db(&db, "sql/schema.sql").unwrap();
        db
    }

    fn listing(source: &str, id: &str, url: &str, price: i64) -> NormalizedListing {
        NormalizedListing {
            source: source.to_string(),
            source_listing_id: id.to_string(),
            url: url.to_string(),
            title: "Maison 5 pièces".to_string(),
            description: None,
            price_eur: price,
            surface_m2: Some(110.0),
            rooms: Some(5),
            city: Some("Nantes".to_string()),
            postal_code: Some("44000".to_string()),
            latitude: Some(47.2),
            longitude: Some(-1.55),
            coord_confidence: Some(0.9),
            images: vec!["https://img.example/1.jpg".to_string()],
            published_at: None,
            seller_name: None,
            seller_type: SellerType::Private,
        }
    }

    #[test]
    fn insert_then_update_counts_as_duplicate() {
        let db = test_db();

        let page1 = vec![listing("leboncoin", "1", "https://lbc.fr/1", 300_000)];
        let stats = save_listings_page(&db, &page1).unwrap();
        assert_eq!((stats.new, stats.duplicate), (1, 0));

        // same ad again, new price
        let page2 = vec![listing("leboncoin", "1", "https://lbc.fr/1", 290_000)];
        let stats = save_listings_page(&db, &page2).unwrap();
        assert_eq!((stats.new, stats.duplicate), (0, 1));

        let rows = search_listings(
            &db,
            1,
            &ListingFilters::default(),
            &SearchPage::default(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price_eur, 290_000);
    }

    #[test]
    fn same_url_across_sources_is_duplicate() {
        let db = test_db();

        save_listings_page(&db, &[listing("leboncoin", "1", "https://lbc.fr/1", 300_000)])
            .unwrap();
        // aggregator relaying the same ad under its own id
        let stats = save_listings_page(
            &db,
            &[listing("moteurimmo", "agg-9", "https://lbc.fr/1", 300_000)],
        )
        .unwrap();

        assert_eq!((stats.new, stats.duplicate), (0, 1));
    }

    #[test]
    fn first_seen_survives_updates() {
        let db = test_db();
        save_listings_page(&db, &[listing("leboncoin", "1", "https://lbc.fr/1", 300_000)])
            .unwrap();
        let before = get_all_first_seen(&db);

        save_listings_page(&db, &[listing("leboncoin", "1", "https://lbc.fr/1", 280_000)])
            .unwrap();
        let after = get_all_first_seen(&db);

        assert_eq!(before, after);
    }

    fn get_all_first_seen(db: &Database) -> Vec<String> {
        db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("select first_seen_at from listings order by id")
                .map_err(|e| ServerError::DbError(e.to_string()))?;
            let rows = stmt
                .query_map([], |r| r.get::<_, String>(0))
                .map_err(|e| ServerError::DbError(e.to_string()))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
            }
            Ok(out)
        })
        .unwrap()
    }

    #[test]
    fn filters_narrow_results() {
        let db = test_db();

        let mut cheap = listing("leboncoin", "1", "https://lbc.fr/1", 120_000);
        cheap.city = Some("Rennes".to_string());
        cheap.postal_code = Some("35000".to_string());
        let expensive = listing("leboncoin", "2", "https://lbc.fr/2", 450_000);
        let mut pro = listing("moteurimmo", "3", "https://mi.fr/3", 300_000);
        pro.seller_type = SellerType::Professional;

        save_listings_page(&db, &[cheap, expensive, pro]).unwrap();

        let under_200k = ListingFilters {
            max_price: Some(200_000),
            ..Default::default()
        };
        let rows = search_listings(&db, 1, &under_200k, &SearchPage::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].city.as_deref(), Some("Rennes"));
        assert_eq!(rows[0].department.as_deref(), Some("35"));

        let private_only = ListingFilters {
            seller_type: Some(SellerType::Private),
            ..Default::default()
        };
        let rows = search_listings(&db, 1, &private_only, &SearchPage::default()).unwrap();
        assert_eq!(rows.len(), 2);

        let nantes = ListingFilters {
            city: Some("nantes".to_string()),
            ..Default::default()
        };
        let rows = search_listings(&db, 1, &nantes, &SearchPage::default()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn location_row_is_written() {
        let db = test_db();
        save_listings_page(&db, &[listing("leboncoin", "1", "https://lbc.fr/1", 300_000)])
            .unwrap();

        let rows = search_listings(
            &db,
            1,
            &ListingFilters::default(),
            &SearchPage::default(),
        )
        .unwrap();
        assert_eq!(rows[0].latitude, Some(47.2));
        assert_eq!(rows[0].longitude, Some(-1.55));
    }
}
