//! Location context builder
//!
//! Resolves a zip code, then queries weather and soil concurrently. Only a
//! geocoding failure fails the build; a weather or soil failure becomes an
//! explicit unavailable marker on the context.

use std::sync::Arc;

use shared::{normalize_zipcode, validate_zipcode, Availability, LocationContext};

use crate::error::{AppError, AppResult};
use crate::external::{Geocoder, SoilProvider, WeatherProvider};

/// Builds [`LocationContext`] values from zip codes
#[derive(Clone)]
pub struct LocationContextBuilder {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherProvider>,
    soil: Arc<dyn SoilProvider>,
}

impl LocationContextBuilder {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherProvider>,
        soil: Arc<dyn SoilProvider>,
    ) -> Self {
        Self {
            geocoder,
            weather,
            soil,
        }
    }

    pub async fn build(&self, zipcode: &str) -> AppResult<LocationContext> {
        validate_zipcode(zipcode).map_err(|msg| AppError::invalid_input("zipcode", msg))?;
        let zipcode = normalize_zipcode(zipcode);

        let coordinates = self.geocoder.resolve(&zipcode).await?;
        tracing::debug!(%zipcode, %coordinates, "Zip code resolved");

        let (weather, soil) = tokio::join!(
            self.weather.forecast(coordinates),
            self.soil.soil_profile(coordinates)
        );

        let weather = degrade("weather", weather);
        let soil = degrade("soil", soil);

        let context = LocationContext::new(zipcode, coordinates, weather, soil);
        tracing::info!(
            zipcode = %context.zipcode,
            partial = context.is_partial(),
            weather = context.weather.is_available(),
            soil = context.soil.is_available(),
            "Location context built"
        );
        Ok(context)
    }
}

fn degrade<T>(part: &str, result: AppResult<T>) -> Availability<T> {
    if let Err(e) = &result {
        tracing::warn!(part, error = %e, "Lookup failed; continuing with partial location context");
    }
    result.into()
}
