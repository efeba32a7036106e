use crate::parser::{api_error, ParseError};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

/// Placeholder for fields the listing does not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// A photo with its size-substituted URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub url: String,
    pub filename: String,
}

/// Structured fields of an item-detail payload
///
/// Category and phones are resolved later: the payload only carries the
/// category id and whether a phone exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferDetails {
    pub url: String,
    pub title: String,
    pub category_id: u64,
    pub last_refresh_time: String,
    pub created_time: String,
    pub price: String,
    pub state: String,
    pub description: String,
    pub city: String,
    pub region: String,
    pub photos: Vec<Photo>,
    pub contact_name: String,
    /// The listing exposes a phone at all
    pub has_phone: bool,
    /// The seller restricted the phone to logged-in users
    pub protect_phone: bool,
    pub user_id: u64,
    pub user_name: String,
    pub user_created: String,
    pub user_last_seen: String,
}

#[derive(Deserialize)]
struct OfferPayload {
    data: OfferData,
}

#[derive(Deserialize)]
struct OfferData {
    url: String,
    title: String,
    category: IdRef,
    last_refresh_time: String,
    created_time: String,
    #[serde(default)]
    params: Vec<OfferParam>,
    #[serde(default)]
    description: String,
    location: Location,
    #[serde(default)]
    photos: Vec<RawPhoto>,
    contact: Contact,
    #[serde(default)]
    protect_phone: bool,
    user: User,
}

#[derive(Deserialize)]
struct IdRef {
    id: u64,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct Location {
    city: Named,
    region: Named,
}

#[derive(Deserialize)]
struct OfferParam {
    key: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct RawPhoto {
    link: String,
    width: u32,
    height: u32,
    filename: String,
}

#[derive(Deserialize)]
struct Contact {
    name: String,
    #[serde(default)]
    phone: bool,
}

#[derive(Deserialize)]
struct User {
    id: u64,
    name: String,
    created: String,
    #[serde(default)]
    last_seen: Option<String>,
}

/// Renders an API timestamp as `YYYY-MM-DD HH:MM:SS`, dropping the offset
pub fn format_date_time(text: &str) -> String {
    match DateTime::parse_from_rfc3339(text) {
        Ok(parsed) => parsed.naive_local().format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => text
            .split('+')
            .next()
            .unwrap_or_default()
            .replace('T', " "),
    }
}

impl OfferDetails {
    pub(crate) fn from_json(json: &Value) -> Result<Self, ParseError> {
        if let Some(error) = api_error(json) {
            return Err(ParseError::Api(error));
        }

        let OfferPayload { data } = OfferPayload::deserialize(json)?;

        let param_label = |key: &str| {
            data.params
                .iter()
                .find(|param| param.key == key)
                .and_then(|param| param.value.get("label"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };
        let price = param_label("price");
        let state = param_label("state");

        let photos = data
            .photos
            .iter()
            .map(|photo| Photo {
                url: photo
                    .link
                    .replace("{width}", &photo.width.to_string())
                    .replace("{height}", &photo.height.to_string()),
                filename: photo.filename.clone(),
            })
            .collect();

        Ok(Self {
            url: data.url,
            title: data.title,
            category_id: data.category.id,
            last_refresh_time: format_date_time(&data.last_refresh_time),
            created_time: format_date_time(&data.created_time),
            price,
            state,
            description: data.description.replace(['\r', '\n'], ""),
            city: data.location.city.name,
            region: data.location.region.name,
            photos,
            contact_name: data.contact.name,
            has_phone: data.contact.phone,
            protect_phone: data.protect_phone,
            user_id: data.user.id,
            user_name: data.user.name,
            user_created: format_date_time(&data.user.created),
            user_last_seen: data
                .user
                .last_seen
                .as_deref()
                .map(format_date_time)
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_offer_json(category_id: u64, phone: bool, protect_phone: bool) -> Value {
    serde_json::json!({
        "data": {
            "url": "https://www.example.ua/item/bike-ID1.html",
            "title": "Mountain bike",
            "category": {"id": category_id},
            "last_refresh_time": "2021-11-02T10:15:00+02:00",
            "created_time": "2021-11-01T09:00:00+02:00",
            "params": [
                {"key": "price", "value": {"label": "5 000 грн.", "value": 5000}},
                {"key": "wheel", "value": {"label": "29"}}
            ],
            "description": "Great bike\r\nbarely used\n",
            "location": {"city": {"name": "Kyiv"}, "region": {"name": "Kyiv region"}},
            "photos": [
                {"link": "https://img.example.ua/1/image;s={width}x{height}", "width": 800, "height": 600, "filename": "abc"},
                {"link": "https://img.example.ua/2/image;s={width}x{height}", "width": 640, "height": 480, "filename": "def"}
            ],
            "contact": {"name": "Ivan", "phone": phone},
            "protect_phone": protect_phone,
            "user": {
                "id": 77,
                "name": "Ivan",
                "created": "2015-05-05T12:00:00+03:00",
                "last_seen": "2021-11-02T11:00:00+02:00"
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_date_time() {
        assert_eq!(format_date_time("2021-11-02T10:15:00+02:00"), "2021-11-02 10:15:00");
        assert_eq!(format_date_time("2021-11-02T10:15:00"), "2021-11-02 10:15:00");
    }

    #[test]
    fn test_offer_fields() {
        let offer = OfferDetails::from_json(&sample_offer_json(5, true, false)).unwrap();

        assert_eq!(offer.title, "Mountain bike");
        assert_eq!(offer.category_id, 5);
        assert_eq!(offer.created_time, "2021-11-01 09:00:00");
        assert_eq!(offer.price, "5 000 грн.");
        assert_eq!(offer.state, NOT_AVAILABLE);
        assert_eq!(offer.description, "Great bikebarely used");
        assert_eq!(offer.city, "Kyiv");
        assert_eq!(offer.photos.len(), 2);
        assert_eq!(offer.photos[0].url, "https://img.example.ua/1/image;s=800x600");
        assert_eq!(offer.photos[1].filename, "def");
        assert!(offer.has_phone);
        assert!(!offer.protect_phone);
        assert_eq!(offer.user_id, 77);
        assert_eq!(offer.user_last_seen, "2021-11-02 11:00:00");
    }

    #[test]
    fn test_api_error_field() {
        let result = OfferDetails::from_json(&json!({"error": {"status": 400}}));
        assert!(matches!(result, Err(ParseError::Api(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let mut payload = sample_offer_json(5, true, false);
        payload["data"].as_object_mut().unwrap().remove("user");
        assert!(matches!(
            OfferDetails::from_json(&payload),
            Err(ParseError::Shape(_))
        ));
    }
}
