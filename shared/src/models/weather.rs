//! Weather data models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Precipitation probability (percent) at which a day counts as rainy
pub const RAIN_LIKELY_PERCENT: i32 = 50;

/// Conditions for the current forecast period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentConditions {
    pub temperature: i32,
    pub temperature_unit: String,
    pub wind_speed: Option<String>,
    pub wind_direction: Option<String>,
    pub short_forecast: String,
    pub detailed_forecast: Option<String>,
}

/// Daily forecast entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub high: Option<i32>,
    pub low: Option<i32>,
    pub temperature_unit: String,
    /// Highest probability of precipitation across the day, in percent
    pub precipitation_probability: Option<i32>,
    pub conditions: String,
}

impl DailyForecast {
    pub fn is_rain_likely(&self) -> bool {
        self.precipitation_probability
            .map(|p| p >= RAIN_LIKELY_PERCENT)
            .unwrap_or(false)
    }
}

/// Current weather plus an ordered short-range forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherSummary {
    pub city: Option<String>,
    pub state: Option<String>,
    pub current: CurrentConditions,
    /// Ordered by date, at most three days
    pub forecast: Vec<DailyForecast>,
}

impl WeatherSummary {
    pub fn place_name(&self) -> Option<String> {
        match (&self.city, &self.state) {
            (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
            (Some(city), None) => Some(city.clone()),
            _ => None,
        }
    }
}

/// Check if rain is likely on any forecast day
pub fn has_rain_forecast(summary: &WeatherSummary) -> bool {
    summary.forecast.iter().any(DailyForecast::is_rain_likely)
}

/// Get forecast days with likely rain
pub fn get_rainy_days(summary: &WeatherSummary) -> Vec<&DailyForecast> {
    summary
        .forecast
        .iter()
        .filter(|f| f.is_rain_likely())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32, pop: Option<i32>) -> DailyForecast {
        DailyForecast {
            date: NaiveDate::from_ymd_opt(2026, 5, d).unwrap(),
            high: Some(78),
            low: Some(55),
            temperature_unit: "F".to_string(),
            precipitation_probability: pop,
            conditions: "Partly Cloudy".to_string(),
        }
    }

    #[test]
    fn test_rainy_days() {
        let summary = WeatherSummary {
            city: Some("Menlo Park".to_string()),
            state: Some("CA".to_string()),
            current: CurrentConditions {
                temperature: 64,
                temperature_unit: "F".to_string(),
                wind_speed: Some("5 mph".to_string()),
                wind_direction: Some("W".to_string()),
                short_forecast: "Sunny".to_string(),
                detailed_forecast: None,
            },
            forecast: vec![day(1, Some(10)), day(2, Some(50)), day(3, None)],
        };

        assert!(has_rain_forecast(&summary));
        let rainy = get_rainy_days(&summary);
        assert_eq!(rainy.len(), 1);
        assert_eq!(rainy[0].date.format("%d").to_string(), "02");
        assert_eq!(summary.place_name().as_deref(), Some("Menlo Park, CA"));
    }
}
