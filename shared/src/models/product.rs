//! Product recommendation models

use serde::{Deserialize, Serialize};

/// One ranked listing returned by the product-search service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductListing {
    pub name: String,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub url: String,
}

impl ProductListing {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: None,
            rating: None,
            url: url.into(),
        }
    }
}
