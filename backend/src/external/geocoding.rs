//! Zip code geocoding via the NWS NDFD SOAP endpoint
//!
//! `ndfdXMLclient.php?listZipCodeList=<zip>` answers with a small DWML
//! document whose `<latLonList>` element holds `lat,lon`.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use shared::GpsCoordinates;

use super::{ensure_success, request_error, Geocoder};
use crate::config::ServiceConfig;
use crate::error::{AppError, AppResult, Upstream};

/// NWS zip code lookup client
#[derive(Clone)]
pub struct NwsGeocodingClient {
    client: Client,
    endpoint: String,
}

impl NwsGeocodingClient {
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    /// Fetch the raw DWML document for a zip code
    async fn fetch(&self, zipcode: &str) -> AppResult<String> {
        tracing::debug!(zipcode, "Resolving zip code");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("listZipCodeList", zipcode)])
            .send()
            .await
            .map_err(|e| request_error(Upstream::Geocoding, e))?;

        ensure_success(Upstream::Geocoding, response)
            .await?
            .text()
            .await
            .map_err(|e| request_error(Upstream::Geocoding, e))
    }
}

#[async_trait]
impl Geocoder for NwsGeocodingClient {
    async fn resolve(&self, zipcode: &str) -> AppResult<GpsCoordinates> {
        let body = match self.fetch(zipcode).await {
            Ok(body) => body,
            Err(AppError::UpstreamTimeout { service }) => {
                return Err(AppError::UpstreamTimeout { service })
            }
            Err(e) => {
                return Err(AppError::Geocoding {
                    zipcode: zipcode.to_string(),
                    message: e.to_string(),
                })
            }
        };
        parse_lat_lon_list(&body, zipcode)
    }
}

/// Extract the coordinates from a DWML `latLonList` response
pub fn parse_lat_lon_list(xml: &str, zipcode: &str) -> AppResult<GpsCoordinates> {
    let geocoding_error = |message: &str| AppError::Geocoding {
        zipcode: zipcode.to_string(),
        message: message.to_string(),
    };

    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| geocoding_error(&format!("malformed response: {}", e)))?;

    let text = doc
        .descendants()
        .find(|n| n.has_tag_name("latLonList"))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| geocoding_error("zip code not found"))?;

    // Multiple zips come back space-separated; only the first is used
    let first = text.split_whitespace().next().unwrap_or(text);
    let (lat, lon) = first
        .split_once(',')
        .ok_or_else(|| geocoding_error("zip code not found"))?;

    let latitude = Decimal::from_str(lat.trim())
        .map_err(|_| geocoding_error(&format!("unreadable latitude '{}'", lat)))?;
    let longitude = Decimal::from_str(lon.trim())
        .map_err(|_| geocoding_error(&format!("unreadable longitude '{}'", lon)))?;

    Ok(GpsCoordinates::new(latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUND: &str = r#"<?xml version="1.0"?>
<dwml version="1.0" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <latLonList>37.4529,-122.1817</latLonList>
</dwml>"#;

    #[test]
    fn test_parse_found_zip() {
        let coords = parse_lat_lon_list(FOUND, "94025").unwrap();
        assert_eq!(coords.latitude, Decimal::from_str("37.4529").unwrap());
        assert_eq!(coords.longitude, Decimal::from_str("-122.1817").unwrap());
    }

    #[test]
    fn test_parse_unknown_zip() {
        let xml = r#"<dwml version="1.0"><latLonList>,</latLonList></dwml>"#;
        let err = parse_lat_lon_list(xml, "00000").unwrap_err();
        assert!(matches!(err, AppError::Geocoding { ref zipcode, .. } if zipcode == "00000"));

        let empty = r#"<dwml version="1.0"><latLonList></latLonList></dwml>"#;
        assert!(parse_lat_lon_list(empty, "00000").is_err());
    }

    #[test]
    fn test_parse_malformed_document() {
        assert!(matches!(
            parse_lat_lon_list("<html>oops", "94025"),
            Err(AppError::Geocoding { .. })
        ));
    }
}
