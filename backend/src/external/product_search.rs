//! Product search via the Serper web search API, restricted to Amazon listings

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::ProductListing;

use super::{ensure_success, request_error, ProductSearch};
use crate::config::ServiceConfig;
use crate::error::{AppError, AppResult, Upstream};

/// Serper search client
#[derive(Clone)]
pub struct SerperProductSearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SerperRequest {
    q: String,
    num: usize,
    gl: &'static str,
}

/// Serper search response
#[derive(Debug, Deserialize)]
pub struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: Option<String>,
    link: Option<String>,
    price: Option<Value>,
    rating: Option<Value>,
}

impl SerperProductSearchClient {
    pub fn new(client: Client, config: &ServiceConfig) -> AppResult<Self> {
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.require_key("product_search")?.to_string(),
        })
    }
}

#[async_trait]
impl ProductSearch for SerperProductSearchClient {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<ProductListing>> {
        tracing::debug!(query, max_results, "Searching products");

        let request = SerperRequest {
            q: format!("site:amazon.com {}", query),
            // Some organic hits are category pages and get filtered out
            num: max_results + 2,
            gl: "us",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(Upstream::ProductSearch, e))?;

        let data: SerperResponse = ensure_success(Upstream::ProductSearch, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                AppError::upstream(
                    Upstream::ProductSearch,
                    format!("Failed to parse search response: {}", e),
                )
            })?;

        Ok(listings_from_response(data, max_results))
    }
}

/// Keep only product-page links, in rank order
pub fn listings_from_response(data: SerperResponse, max_results: usize) -> Vec<ProductListing> {
    data.organic
        .into_iter()
        .filter_map(|item| {
            let url = item.link.filter(|l| is_amazon_product_url(l))?;
            Some(ProductListing {
                name: item.title.unwrap_or_else(|| "Unnamed product".to_string()),
                price: item.price.as_ref().and_then(value_text),
                rating: item.rating.as_ref().and_then(value_text),
                url,
            })
        })
        .take(max_results)
        .collect()
}

/// Product detail pages (`/dp/ASIN`, `/gp/product/ASIN`) or a keyword search page
pub fn is_amazon_product_url(url: &str) -> bool {
    static PRODUCT_PAGE: OnceLock<Regex> = OnceLock::new();
    let product_page = PRODUCT_PAGE.get_or_init(|| {
        Regex::new(r"^https?://(www\.)?amazon\.com(/.*)?(/dp/|/gp/product/)[A-Z0-9]{10}")
            .expect("valid regex")
    });

    if product_page.is_match(url) {
        return true;
    }
    url.starts_with("https://www.amazon.com/s?") && url.contains("k=")
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amazon_url_validation() {
        assert!(is_amazon_product_url(
            "https://www.amazon.com/Monterey-LG6135-Garden-Insect-Spray/dp/B000BWY3OQ"
        ));
        assert!(is_amazon_product_url(
            "https://www.amazon.com/gp/product/B01N5P4A4M?th=1"
        ));
        assert!(is_amazon_product_url("https://www.amazon.com/s?k=neem+oil"));
        assert!(!is_amazon_product_url("https://www.amazon.com/b?node=3238155011"));
        assert!(!is_amazon_product_url("https://example.com/dp/B000BWY3OQ"));
        assert!(!is_amazon_product_url("#"));
    }

    #[test]
    fn test_listings_filtered_and_limited() {
        let data: SerperResponse = serde_json::from_value(json!({
            "organic": [
                { "title": "Pest Control category", "link": "https://www.amazon.com/b?node=1" },
                { "title": "Spinosad Concentrate", "link": "https://www.amazon.com/Spinosad/dp/B000BWY3OQ", "rating": 4.6, "price": "$19.99" },
                { "title": "Neem Oil 16oz", "link": "https://www.amazon.com/Neem/dp/B01N5P4A4M" },
                { "title": "Third", "link": "https://www.amazon.com/Third/dp/B07XYZ1234" }
            ]
        }))
        .unwrap();

        let listings = listings_from_response(data, 2);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].name, "Spinosad Concentrate");
        assert_eq!(listings[0].rating.as_deref(), Some("4.6"));
        assert_eq!(listings[0].price.as_deref(), Some("$19.99"));
        assert!(listings[1].price.is_none());
    }

    #[test]
    fn test_empty_results_are_valid() {
        let data: SerperResponse = serde_json::from_value(json!({})).unwrap();
        assert!(listings_from_response(data, 2).is_empty());
    }
}
