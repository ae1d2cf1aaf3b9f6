//! Configuration management for the Agri Advisor backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with AGRI_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Outbound HTTP settings shared by every collaborator client
    pub http: HttpConfig,

    /// Image classification service
    pub vision: ServiceConfig,

    /// Zip code to coordinate lookup
    pub geocoding: ServiceConfig,

    /// Forecast service
    pub weather: ServiceConfig,

    /// Soil database service
    pub soil: ServiceConfig,

    /// Product search service
    pub product_search: ServiceConfig,

    /// Natural-language generation service
    pub nlg: ServiceConfig,

    /// Session behaviour
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent upstream (required by api.weather.gov)
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Base URL or full endpoint of the service
    pub endpoint: String,

    /// API key, if the service needs one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name for AI-backed services
    #[serde(default)]
    pub model: Option<String>,
}

impl ServiceConfig {
    /// API key or a configuration error naming the service
    pub fn require_key(&self, service: &str) -> Result<&str, crate::error::AppError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                crate::error::AppError::Configuration(format!(
                    "{} api_key is not set",
                    service
                ))
            })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Pending turns buffered per session actor
    pub channel_capacity: usize,

    /// Results requested per product search
    pub product_results: usize,

    /// Seconds without a command before a session actor is dropped
    pub idle_timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AGRI_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("http.timeout_secs", 15)?
            .set_default("http.user_agent", "AgriAdvisor/0.1 (agronomy assistant)")?
            .set_default(
                "vision.endpoint",
                "https://api.groq.com/openai/v1/chat/completions",
            )?
            .set_default("vision.model", "meta-llama/llama-4-maverick-17b-128e-instruct")?
            .set_default(
                "geocoding.endpoint",
                "https://graphical.weather.gov/xml/SOAP_server/ndfdXMLclient.php",
            )?
            .set_default("weather.endpoint", "https://api.weather.gov")?
            .set_default(
                "soil.endpoint",
                "https://sdmdataaccess.nrcs.usda.gov/Tabular/post.rest",
            )?
            .set_default("product_search.endpoint", "https://google.serper.dev/search")?
            .set_default(
                "nlg.endpoint",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("nlg.model", "gemini-2.5-flash")?
            .set_default("session.channel_capacity", 16)?
            .set_default("session.product_results", 2)?
            .set_default("session.idle_timeout_secs", 1800)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGRI_ prefix)
            .add_source(
                Environment::with_prefix("AGRI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl ServiceConfig {
    fn keyless(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: None,
            model: None,
        }
    }
}

/// Code defaults only, without files or environment overrides
impl Default for Config {
    fn default() -> Self {
        let mut vision = ServiceConfig::keyless("https://api.groq.com/openai/v1/chat/completions");
        vision.model = Some("meta-llama/llama-4-maverick-17b-128e-instruct".to_string());
        let mut nlg = ServiceConfig::keyless("https://generativelanguage.googleapis.com/v1beta");
        nlg.model = Some("gemini-2.5-flash".to_string());

        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            http: HttpConfig::default(),
            vision,
            geocoding: ServiceConfig::keyless(
                "https://graphical.weather.gov/xml/SOAP_server/ndfdXMLclient.php",
            ),
            weather: ServiceConfig::keyless("https://api.weather.gov"),
            soil: ServiceConfig::keyless("https://sdmdataaccess.nrcs.usda.gov/Tabular/post.rest"),
            product_search: ServiceConfig::keyless("https://google.serper.dev/search"),
            nlg,
            session: SessionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "AgriAdvisor/0.1 (agronomy assistant)".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            product_results: 2,
            idle_timeout_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_key() {
        let mut service = ServiceConfig {
            endpoint: "https://example.test".to_string(),
            api_key: None,
            model: None,
        };
        assert!(service.require_key("nlg").is_err());

        service.api_key = Some(String::new());
        assert!(service.require_key("nlg").is_err());

        service.api_key = Some("secret".to_string());
        assert_eq!(service.require_key("nlg").unwrap(), "secret");
    }

    #[test]
    fn test_defaults_need_keys_for_keyed_services() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.product_results, 2);
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert!(config.geocoding.api_key.is_none());
        assert!(config.nlg.require_key("nlg").is_err());
    }
}
