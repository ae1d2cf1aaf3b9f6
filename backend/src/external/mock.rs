//! Scripted collaborators for tests
//!
//! Each mock pops queued outcomes first and falls back to its default once the
//! queue is empty. Calls are recorded so tests can assert on what was asked.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    classify_texture, CurrentConditions, DailyForecast, GpsCoordinates, ProductListing,
    SoilChemistry, SoilProfile, SoilSample, WeatherSummary,
};

use super::{
    Collaborators, DetectionProvider, Geocoder, ProductSearch, SoilProvider, TextGenerator,
    WeatherProvider,
};
use crate::error::{AppError, AppResult, Upstream};

/// Failure a mock should report
#[derive(Debug, Clone)]
pub enum MockFailure {
    Unavailable(String),
    Timeout,
}

type Outcome<T> = Result<T, MockFailure>;

struct Script<T: Clone> {
    queue: Mutex<VecDeque<Outcome<T>>>,
    default: Mutex<Outcome<T>>,
    calls: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T: Clone> Script<T> {
    fn new(default: Outcome<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn next(&self, call: impl Into<String>) -> Outcome<T> {
        lock(&self.calls).push(call.into());
        lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| lock(&self.default).clone())
    }

    fn push(&self, outcome: Outcome<T>) {
        lock(&self.queue).push_back(outcome);
    }

    fn set_default(&self, outcome: Outcome<T>) {
        *lock(&self.default) = outcome;
    }

    fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

macro_rules! scripted_mock {
    ($name:ident, $ty:ty) => {
        impl $name {
            /// Queue a successful outcome
            pub fn push_ok(&self, value: $ty) {
                self.script.push(Ok(value));
            }

            /// Queue a failure
            pub fn push_err(&self, failure: MockFailure) {
                self.script.push(Err(failure));
            }

            /// Outcome used once the queue is empty
            pub fn set_default(&self, outcome: Result<$ty, MockFailure>) {
                self.script.set_default(outcome);
            }

            /// Inputs received so far, oldest first
            pub fn calls(&self) -> Vec<String> {
                self.script.calls()
            }

            pub fn call_count(&self) -> usize {
                self.script.calls().len()
            }
        }
    };
}

// ============================================================================
// Mocks
// ============================================================================

pub struct MockGeocoder {
    script: Script<GpsCoordinates>,
}
scripted_mock!(MockGeocoder, GpsCoordinates);

impl MockGeocoder {
    pub fn new() -> Self {
        Self {
            script: Script::new(Ok(sample_coordinates())),
        }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn resolve(&self, zipcode: &str) -> AppResult<GpsCoordinates> {
        self.script.next(zipcode).map_err(|f| match f {
            MockFailure::Unavailable(message) => AppError::Geocoding {
                zipcode: zipcode.to_string(),
                message,
            },
            MockFailure::Timeout => AppError::UpstreamTimeout {
                service: Upstream::Geocoding,
            },
        })
    }
}

pub struct MockWeather {
    script: Script<WeatherSummary>,
}
scripted_mock!(MockWeather, WeatherSummary);

impl MockWeather {
    pub fn new() -> Self {
        Self {
            script: Script::new(Ok(sample_weather())),
        }
    }
}

#[async_trait]
impl WeatherProvider for MockWeather {
    async fn forecast(&self, coordinates: GpsCoordinates) -> AppResult<WeatherSummary> {
        self.script
            .next(coordinates.to_string())
            .map_err(|f| match f {
                MockFailure::Unavailable(message) => AppError::WeatherUnavailable(message),
                MockFailure::Timeout => AppError::UpstreamTimeout {
                    service: Upstream::Weather,
                },
            })
    }
}

pub struct MockSoil {
    script: Script<SoilProfile>,
}
scripted_mock!(MockSoil, SoilProfile);

impl MockSoil {
    pub fn new() -> Self {
        Self {
            script: Script::new(Ok(sample_soil())),
        }
    }
}

#[async_trait]
impl SoilProvider for MockSoil {
    async fn soil_profile(&self, coordinates: GpsCoordinates) -> AppResult<SoilProfile> {
        self.script
            .next(coordinates.to_string())
            .map_err(|f| match f {
                MockFailure::Unavailable(message) => AppError::SoilDataUnavailable(message),
                MockFailure::Timeout => AppError::UpstreamTimeout {
                    service: Upstream::Soil,
                },
            })
    }
}

pub struct MockProductSearch {
    script: Script<Vec<ProductListing>>,
}
scripted_mock!(MockProductSearch, Vec<ProductListing>);

impl MockProductSearch {
    pub fn new() -> Self {
        Self {
            script: Script::new(Ok(Vec::new())),
        }
    }
}

#[async_trait]
impl ProductSearch for MockProductSearch {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<ProductListing>> {
        self.script
            .next(query)
            .map(|mut listings| {
                listings.truncate(max_results);
                listings
            })
            .map_err(|f| upstream_failure(Upstream::ProductSearch, f))
    }
}

pub struct MockTextGenerator {
    script: Script<String>,
}
scripted_mock!(MockTextGenerator, String);

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            script: Script::new(Ok("Generated guidance.".to_string())),
        }
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        self.script
            .next(prompt)
            .map_err(|f| upstream_failure(Upstream::Nlg, f))
    }
}

pub struct MockDetection {
    script: Script<String>,
}
scripted_mock!(MockDetection, String);

impl MockDetection {
    pub fn new() -> Self {
        Self {
            script: Script::new(Ok(SAMPLE_PEST_DETECTION.to_string())),
        }
    }
}

#[async_trait]
impl DetectionProvider for MockDetection {
    async fn identify(&self, image: &[u8]) -> AppResult<String> {
        self.script
            .next(format!("{} bytes", image.len()))
            .map_err(|f| upstream_failure(Upstream::Vision, f))
    }
}

fn upstream_failure(service: Upstream, failure: MockFailure) -> AppError {
    match failure {
        MockFailure::Unavailable(message) => AppError::upstream(service, message),
        MockFailure::Timeout => AppError::UpstreamTimeout { service },
    }
}

/// Handles to every mock plus the bundle the state machine consumes
pub struct MockCollaborators {
    pub vision: Arc<MockDetection>,
    pub geocoder: Arc<MockGeocoder>,
    pub weather: Arc<MockWeather>,
    pub soil: Arc<MockSoil>,
    pub products: Arc<MockProductSearch>,
    pub nlg: Arc<MockTextGenerator>,
}

impl MockCollaborators {
    pub fn new() -> Self {
        Self {
            vision: Arc::new(MockDetection::new()),
            geocoder: Arc::new(MockGeocoder::new()),
            weather: Arc::new(MockWeather::new()),
            soil: Arc::new(MockSoil::new()),
            products: Arc::new(MockProductSearch::new()),
            nlg: Arc::new(MockTextGenerator::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            vision: self.vision.clone(),
            geocoder: self.geocoder.clone(),
            weather: self.weather.clone(),
            soil: self.soil.clone(),
            products: self.products.clone(),
            nlg: self.nlg.clone(),
        }
    }
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Vision output for an aphid infestation
pub const SAMPLE_PEST_DETECTION: &str = "- **Insect Species**: Green peach aphid (Myzus persicae)
- **Classification**: Pest
- **Crops Affected**: Tomato, pepper, potato
- **Severity Level**: Moderate
- **Confidence**: 88%";

pub fn sample_coordinates() -> GpsCoordinates {
    GpsCoordinates::new(
        Decimal::from_str("37.4529").unwrap_or_default(),
        Decimal::from_str("-122.1817").unwrap_or_default(),
    )
}

pub fn sample_weather() -> WeatherSummary {
    let day = |d: u32, high: i32, low: i32, pop: i32, conditions: &str| DailyForecast {
        date: NaiveDate::from_ymd_opt(2026, 5, d).unwrap_or_default(),
        high: Some(high),
        low: Some(low),
        temperature_unit: "F".to_string(),
        precipitation_probability: Some(pop),
        conditions: conditions.to_string(),
    };

    WeatherSummary {
        city: Some("Menlo Park".to_string()),
        state: Some("CA".to_string()),
        current: CurrentConditions {
            temperature: 68,
            temperature_unit: "F".to_string(),
            wind_speed: Some("5 to 10 mph".to_string()),
            wind_direction: Some("NW".to_string()),
            short_forecast: "Sunny".to_string(),
            detailed_forecast: Some("Sunny, with a high near 72.".to_string()),
        },
        forecast: vec![
            day(1, 72, 51, 10, "Sunny"),
            day(2, 65, 49, 70, "Rain Likely"),
            day(3, 68, 50, 20, "Partly Sunny"),
        ],
    }
}

pub fn sample_soil() -> SoilProfile {
    let sample = SoilSample::new(22.0, 40.0, 38.0);
    SoilProfile {
        soil_name: "Tierra loam, 2 to 9 percent slopes".to_string(),
        component_name: Some("Tierra".to_string()),
        drainage_class: Some("Moderately well drained".to_string()),
        sample,
        texture: classify_texture(&sample).unwrap_or(shared::TextureClass::Loam),
        chemistry: SoilChemistry {
            ph: Some(6.4),
            organic_matter_percent: Some(2.5),
            horizon_top_cm: Some(0.0),
            horizon_bottom_cm: Some(18.0),
        },
    }
}

pub fn sample_listing(name: &str, asin: &str) -> ProductListing {
    ProductListing {
        name: name.to_string(),
        price: Some("$18.99".to_string()),
        rating: Some("4.5".to_string()),
        url: format!("https://www.amazon.com/dp/{}", asin),
    }
}
