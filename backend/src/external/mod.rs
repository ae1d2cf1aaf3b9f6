//! External API integrations
//!
//! Every collaborator sits behind a narrow async trait so the conversation
//! core can be driven by the HTTP clients in production and by the queued
//! mocks in tests.

pub mod geocoding;
pub mod mock;
pub mod nlg;
pub mod product_search;
pub mod soil;
pub mod vision;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{GpsCoordinates, ProductListing, SoilProfile, WeatherSummary};

use crate::config::{Config, HttpConfig};
use crate::error::{AppError, AppResult, Upstream};

pub use geocoding::NwsGeocodingClient;
pub use nlg::GeminiClient;
pub use product_search::SerperProductSearchClient;
pub use soil::SoilDataAccessClient;
pub use vision::VisionDetectionClient;
pub use weather::WeatherClient;

/// Resolves a US zip code to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, zipcode: &str) -> AppResult<GpsCoordinates>;
}

/// Current conditions and a short-range forecast for a coordinate
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn forecast(&self, coordinates: GpsCoordinates) -> AppResult<WeatherSummary>;
}

/// Dominant surface soil for a coordinate
#[async_trait]
pub trait SoilProvider: Send + Sync {
    async fn soil_profile(&self, coordinates: GpsCoordinates) -> AppResult<SoilProfile>;
}

/// Ranked product listings for a free-text query. An empty list is a valid answer.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<ProductListing>>;
}

/// Natural-language generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

/// Image classification returning the service's raw text
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    async fn identify(&self, image: &[u8]) -> AppResult<String>;
}

/// The full set of collaborators a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub vision: Arc<dyn DetectionProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub weather: Arc<dyn WeatherProvider>,
    pub soil: Arc<dyn SoilProvider>,
    pub products: Arc<dyn ProductSearch>,
    pub nlg: Arc<dyn TextGenerator>,
}

impl Collaborators {
    /// Build the HTTP-backed collaborators from configuration
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = build_http_client(&config.http)?;

        Ok(Self {
            vision: Arc::new(VisionDetectionClient::new(http.clone(), &config.vision)?),
            geocoder: Arc::new(NwsGeocodingClient::new(http.clone(), &config.geocoding)),
            weather: Arc::new(WeatherClient::new(http.clone(), &config.weather)),
            soil: Arc::new(SoilDataAccessClient::new(http.clone(), &config.soil)),
            products: Arc::new(SerperProductSearchClient::new(
                http.clone(),
                &config.product_search,
            )?),
            nlg: Arc::new(GeminiClient::new(http, &config.nlg)?),
        })
    }
}

/// Shared reqwest client with the configured timeout and User-Agent
pub fn build_http_client(http: &HttpConfig) -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(http.timeout_secs))
        .user_agent(http.user_agent.clone())
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Map a transport error, keeping timeouts distinguishable
pub(crate) fn request_error(service: Upstream, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::UpstreamTimeout { service }
    } else {
        AppError::upstream(service, format!("Request failed: {}", e))
    }
}

/// Turn a non-2xx response into an upstream error carrying the body
pub(crate) async fn ensure_success(service: Upstream, response: Response) -> AppResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AppError::upstream(
        service,
        format!("API returned {}: {}", status, body),
    ))
}
