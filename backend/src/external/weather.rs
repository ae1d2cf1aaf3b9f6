//! Weather API client for fetching forecast data
//!
//! Integrates with api.weather.gov: `/points/{lat},{lon}` yields the grid
//! forecast URL and the nearest city, the forecast URL yields 12-hour periods
//! that are folded into daily entries here.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use shared::{CurrentConditions, DailyForecast, GpsCoordinates, WeatherSummary};

use super::{ensure_success, request_error, WeatherProvider};
use crate::config::ServiceConfig;
use crate::error::{AppError, AppResult, Upstream};

/// Number of calendar days kept in a summary
pub const FORECAST_DAYS: usize = 3;

/// Weather API client
#[derive(Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

/// api.weather.gov `/points` response
#[derive(Debug, Deserialize)]
pub struct NwsPointsResponse {
    properties: NwsPointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPointsProperties {
    forecast: Option<String>,
    relative_location: Option<NwsRelativeLocation>,
}

#[derive(Debug, Deserialize)]
struct NwsRelativeLocation {
    properties: NwsPlace,
}

#[derive(Debug, Deserialize)]
struct NwsPlace {
    city: Option<String>,
    state: Option<String>,
}

/// api.weather.gov forecast response
#[derive(Debug, Deserialize)]
pub struct NwsForecastResponse {
    properties: NwsForecastProperties,
}

#[derive(Debug, Deserialize)]
struct NwsForecastProperties {
    #[serde(default)]
    periods: Vec<NwsPeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPeriod {
    start_time: String,
    #[serde(default = "default_daytime")]
    is_daytime: bool,
    temperature: Option<i32>,
    temperature_unit: Option<String>,
    wind_speed: Option<String>,
    wind_direction: Option<String>,
    short_forecast: Option<String>,
    detailed_forecast: Option<String>,
    probability_of_precipitation: Option<NwsQuantity>,
}

#[derive(Debug, Deserialize)]
struct NwsQuantity {
    value: Option<f64>,
}

fn default_daytime() -> bool {
    true
}

impl WeatherClient {
    /// Create a new WeatherClient
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        tracing::debug!(url, "Weather API request");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/geo+json")
            .send()
            .await
            .map_err(|e| request_error(Upstream::Weather, e))?;

        ensure_success(Upstream::Weather, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                AppError::WeatherUnavailable(format!("Failed to parse weather response: {}", e))
            })
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn forecast(&self, coordinates: GpsCoordinates) -> AppResult<WeatherSummary> {
        let points_url = format!(
            "{}/points/{},{}",
            self.base_url,
            coordinates.latitude.round_dp(4),
            coordinates.longitude.round_dp(4)
        );
        let points: NwsPointsResponse = self.get_json(&points_url).await?;

        let forecast_url = points.properties.forecast.clone().ok_or_else(|| {
            AppError::WeatherUnavailable("no forecast office covers this location".to_string())
        })?;
        let forecast: NwsForecastResponse = self.get_json(&forecast_url).await?;

        summarize_forecast(points, forecast)
    }
}

/// Convert the two NWS responses into a summary with at most three days
pub fn summarize_forecast(
    points: NwsPointsResponse,
    forecast: NwsForecastResponse,
) -> AppResult<WeatherSummary> {
    let (city, state) = match points.properties.relative_location {
        Some(location) => (location.properties.city, location.properties.state),
        None => (None, None),
    };

    let periods = forecast.properties.periods;
    let first = periods
        .first()
        .ok_or_else(|| AppError::WeatherUnavailable("forecast has no periods".to_string()))?;

    let current = CurrentConditions {
        temperature: first.temperature.ok_or_else(|| {
            AppError::WeatherUnavailable("current period has no temperature".to_string())
        })?,
        temperature_unit: first
            .temperature_unit
            .clone()
            .unwrap_or_else(|| "F".to_string()),
        wind_speed: first.wind_speed.clone(),
        wind_direction: first.wind_direction.clone(),
        short_forecast: first.short_forecast.clone().unwrap_or_default(),
        detailed_forecast: first.detailed_forecast.clone(),
    };

    Ok(WeatherSummary {
        city,
        state,
        current,
        forecast: group_into_days(&periods),
    })
}

/// Fold 12-hour periods into calendar days, in order
fn group_into_days(periods: &[NwsPeriod]) -> Vec<DailyForecast> {
    let mut days: Vec<DailyForecast> = Vec::new();

    for period in periods {
        let Some(date) = period_date(&period.start_time) else {
            tracing::debug!(start_time = %period.start_time, "Skipping period with unreadable start time");
            continue;
        };
        let pop = period
            .probability_of_precipitation
            .as_ref()
            .and_then(|q| q.value)
            .map(|v| v.round() as i32);

        if days.last().map_or(true, |d| d.date != date) {
            if days.len() == FORECAST_DAYS {
                break;
            }
            days.push(DailyForecast {
                date,
                high: None,
                low: None,
                temperature_unit: period
                    .temperature_unit
                    .clone()
                    .unwrap_or_else(|| "F".to_string()),
                precipitation_probability: None,
                conditions: String::new(),
            });
        }
        let Some(day) = days.last_mut() else {
            continue;
        };

        if let Some(temp) = period.temperature {
            if period.is_daytime {
                day.high = Some(day.high.map_or(temp, |h| h.max(temp)));
            } else {
                day.low = Some(day.low.map_or(temp, |l| l.min(temp)));
            }
        }
        if let Some(p) = pop {
            day.precipitation_probability =
                Some(day.precipitation_probability.map_or(p, |d| d.max(p)));
        }
        if let Some(short) = &period.short_forecast {
            if day.conditions.is_empty() || period.is_daytime {
                day.conditions = short.clone();
            }
        }
    }

    days
}

fn period_date(start_time: &str) -> Option<NaiveDate> {
    DateTime::<FixedOffset>::parse_from_rfc3339(start_time)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn points() -> NwsPointsResponse {
        serde_json::from_value(json!({
            "properties": {
                "forecast": "https://api.weather.gov/gridpoints/MTR/93,106/forecast",
                "relativeLocation": {
                    "properties": { "city": "Menlo Park", "state": "CA" }
                }
            }
        }))
        .unwrap()
    }

    fn period(start: &str, day: bool, temp: i32, pop: Option<f64>, short: &str) -> serde_json::Value {
        json!({
            "startTime": start,
            "isDaytime": day,
            "temperature": temp,
            "temperatureUnit": "F",
            "windSpeed": "5 to 10 mph",
            "windDirection": "NW",
            "shortForecast": short,
            "detailedForecast": format!("{} all day.", short),
            "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": pop }
        })
    }

    #[test]
    fn test_summarize_groups_periods_into_three_days() {
        let forecast: NwsForecastResponse = serde_json::from_value(json!({
            "properties": { "periods": [
                period("2026-05-01T06:00:00-07:00", true, 72, Some(10.0), "Sunny"),
                period("2026-05-01T18:00:00-07:00", false, 51, None, "Clear"),
                period("2026-05-02T06:00:00-07:00", true, 65, Some(60.0), "Rain Likely"),
                period("2026-05-02T18:00:00-07:00", false, 49, Some(70.0), "Rain"),
                period("2026-05-03T06:00:00-07:00", true, 68, Some(20.0), "Partly Sunny"),
                period("2026-05-03T18:00:00-07:00", false, 50, None, "Mostly Clear"),
                period("2026-05-04T06:00:00-07:00", true, 75, None, "Sunny")
            ]}
        }))
        .unwrap();

        let summary = summarize_forecast(points(), forecast).unwrap();
        assert_eq!(summary.place_name().as_deref(), Some("Menlo Park, CA"));
        assert_eq!(summary.current.temperature, 72);
        assert_eq!(summary.current.short_forecast, "Sunny");

        assert_eq!(summary.forecast.len(), 3);
        let rainy = &summary.forecast[1];
        assert_eq!(rainy.high, Some(65));
        assert_eq!(rainy.low, Some(49));
        assert_eq!(rainy.precipitation_probability, Some(70));
        assert_eq!(rainy.conditions, "Rain Likely");
        assert!(summary.forecast[0].date < summary.forecast[1].date);
    }

    #[test]
    fn test_summary_starting_at_night() {
        let forecast: NwsForecastResponse = serde_json::from_value(json!({
            "properties": { "periods": [
                period("2026-05-01T18:00:00-07:00", false, 51, None, "Clear"),
                period("2026-05-02T06:00:00-07:00", true, 70, None, "Sunny")
            ]}
        }))
        .unwrap();

        let summary = summarize_forecast(points(), forecast).unwrap();
        assert_eq!(summary.forecast[0].high, None);
        assert_eq!(summary.forecast[0].low, Some(51));
        assert_eq!(summary.forecast[0].conditions, "Clear");
    }

    #[test]
    fn test_empty_forecast_is_unavailable() {
        let forecast: NwsForecastResponse =
            serde_json::from_value(json!({ "properties": { "periods": [] } })).unwrap();
        assert!(matches!(
            summarize_forecast(points(), forecast),
            Err(AppError::WeatherUnavailable(_))
        ));
    }
}
