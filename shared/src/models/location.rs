//! Location context models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SoilProfile, WeatherSummary};
use crate::types::{Availability, GpsCoordinates};

/// Combined weather and soil snapshot for one coordinate.
///
/// Built once per submitted zip code and never mutated; either half may be
/// an explicit unavailable marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationContext {
    pub zipcode: String,
    pub coordinates: GpsCoordinates,
    pub weather: Availability<WeatherSummary>,
    pub soil: Availability<SoilProfile>,
    pub built_at: DateTime<Utc>,
}

impl LocationContext {
    pub fn new(
        zipcode: impl Into<String>,
        coordinates: GpsCoordinates,
        weather: Availability<WeatherSummary>,
        soil: Availability<SoilProfile>,
    ) -> Self {
        Self {
            zipcode: zipcode.into(),
            coordinates,
            weather,
            soil,
            built_at: Utc::now(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.weather.is_available() || !self.soil.is_available()
    }

    pub fn place_name(&self) -> String {
        self.weather
            .as_option()
            .and_then(WeatherSummary::place_name)
            .unwrap_or_else(|| format!("zip {}", self.zipcode))
    }
}
