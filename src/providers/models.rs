use serde::Deserialize;

// moteurimmo page
//  ├── ads[]
//  │    ├── id
//  │    ├── title / description
//  │    ├── price (EUR), surface (m²), rooms
//  │    ├── city / postalCode
//  │    ├── latitude / longitude / locationAccuracy
//  │    ├── pictureUrls[]
//  │    ├── publicationDate (RFC 3339)
//  │    └── sellerName / sellerType
//  └── totalPages

#[derive(Debug, Deserialize)]
pub struct MoteurImmoPage {
    pub ads: Vec<MoteurImmoAd>,
    #[serde(rename = "totalPages")]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MoteurImmoAd {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,

    pub price: Option<f64>,
    pub surface: Option<f64>,
    pub rooms: Option<i64>,

    pub city: Option<String>,
    #[serde(rename = "postalCode")]
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "locationAccuracy")]
    pub location_accuracy: Option<f64>,

    pub url: Option<String>,
    #[serde(rename = "pictureUrls", default)]
    pub picture_urls: Vec<String>,
    #[serde(rename = "publicationDate")]
    pub publication_date: Option<String>,

    #[serde(rename = "sellerName")]
    pub seller_name: Option<String>,
    #[serde(rename = "sellerType")]
    pub seller_type: Option<String>,
}

// The classifieds site embeds the search results as JSON inside the
// page's __NEXT_DATA__ script tag. Only the fields we read are modeled.

#[derive(Debug, Deserialize)]
pub struct ClassifiedAd {
    pub list_id: Option<i64>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,

    // Price comes as a single-element array.
    pub price: Option<Vec<i64>>,

    #[serde(rename = "first_publication_date")]
    pub first_publication_date: Option<String>,

    pub images: Option<ClassifiedImages>,
    pub location: Option<ClassifiedLocation>,
    pub owner: Option<ClassifiedOwner>,

    #[serde(default)]
    pub attributes: Vec<ClassifiedAttribute>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifiedImages {
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifiedLocation {
    pub city: Option<String>,
    pub zipcode: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifiedOwner {
    #[serde(rename = "type")]
    pub owner_type: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifiedAttribute {
    pub key: String,
    pub value: String,
}

impl ClassifiedAd {
    /// Attribute lookup ("rooms", "square", ...). Values arrive as text.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}
