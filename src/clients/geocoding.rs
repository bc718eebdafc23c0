use serde::{Deserialize, Serialize};

use crate::error::GeocodeError;

const SUGGESTION_LIMIT: u8 = 5;

/// Address match offered while filling in an event or vendor location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceSuggestion {
    pub place_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    display_name: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
}

impl RawPlace {
    fn into_suggestion(self) -> Option<PlaceSuggestion> {
        Some(PlaceSuggestion {
            place_name: self.display_name?,
            latitude: self.lat?.trim().parse().ok()?,
            longitude: self.lon?.trim().parse().ok()?,
        })
    }
}

/// Client for a LocationIQ-compatible autocomplete endpoint.
#[derive(Clone)]
pub struct GeocodingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeocodingClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(&base_url),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<PlaceSuggestion>, GeocodeError> {
        let api_key = self.api_key.as_deref().ok_or(GeocodeError::NotConfigured)?;
        let url = format!("{}/autocomplete", self.base_url);
        let limit = SUGGESTION_LIMIT.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", api_key),
                ("q", query),
                ("limit", limit.as_str()),
                ("dedupe", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        Ok(parse_suggestions(body))
    }
}

/// Anything other than an array of places yields no suggestions; unparsable coordinates are skipped.
fn parse_suggestions(body: serde_json::Value) -> Vec<PlaceSuggestion> {
    match serde_json::from_value::<Vec<RawPlace>>(body) {
        Ok(places) => places
            .into_iter()
            .filter_map(RawPlace::into_suggestion)
            .collect(),
        Err(err) => {
            log::warn!("Unexpected geocoder response: {}", err);
            Vec::new()
        }
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_coordinates() {
        let body = json!([
            {
                "display_name": "Lake Merritt, Oakland, California, USA",
                "lat": "37.8024",
                "lon": "-122.2585"
            },
            { "display_name": "Broken", "lat": "north", "lon": "-122.0" },
            { "lat": "1.0", "lon": "2.0" }
        ]);

        let suggestions = parse_suggestions(body);
        assert_eq!(
            suggestions,
            vec![PlaceSuggestion {
                place_name: "Lake Merritt, Oakland, California, USA".into(),
                latitude: 37.8024,
                longitude: -122.2585,
            }]
        );
    }

    #[test]
    fn error_objects_yield_nothing() {
        assert!(parse_suggestions(json!({ "error": "Unable to geocode" })).is_empty());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://api.locationiq.com/v1/"),
            "https://api.locationiq.com/v1"
        );
    }

    #[actix_web::test]
    async fn missing_key_is_reported() {
        let client = GeocodingClient::new("http://localhost:9".into(), None);
        assert!(!client.is_configured());
        let err = client.search("oakland").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotConfigured));
    }
}
