//! Vision detection client
//!
//! Sends an image to an OpenAI-compatible multimodal chat completion endpoint
//! and returns the model's raw text. Parsing happens in the shared crate.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ensure_success, request_error, DetectionProvider};
use crate::config::ServiceConfig;
use crate::error::{AppError, AppResult, Upstream};

const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

/// Instructions that make the model answer in `- **Label**: value` bullets
pub const DETECTION_PROMPT: &str = "You are an agricultural expert specializing in plant health and pest identification.

Analyze this image and determine whether it shows a PLANT or an INSECT/PEST.

If it is a PLANT, answer with these bullet lines:
- **Plant Species**: [species if identifiable]
- **Health Status**: Healthy or Diseased
- **Disease Name**: [specific name if diseased, otherwise N/A]
- **Symptoms Observed**: [spots, discoloration, wilting, etc.]
- **Severity Level**: Mild / Moderate / Severe
- **Confidence**: [0-100%]

If it is an INSECT/PEST, answer with these bullet lines:
- **Insect Species**: [common and scientific name]
- **Classification**: Pest / Beneficial / Pollinator
- **Crops Affected**: [comma-separated list]
- **Damage Description**: [damage it causes]
- **Severity Level**: Mild / Moderate / Severe
- **Confidence**: [0-100%]

If the image shows something else or is unclear, respond with \"Unable to identify - please provide a clearer image of a plant or insect.\"";

/// Client for the vision detection service
#[derive(Clone)]
pub struct VisionDetectionClient {
    client: Client,
    api_endpoint: String,
    api_key: String,
    model: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    temperature: f32,
    max_tokens: u32,
}

impl VisionDetectionClient {
    /// Create a new vision detection client
    pub fn new(client: Client, config: &ServiceConfig) -> AppResult<Self> {
        Ok(Self {
            client,
            api_endpoint: config.endpoint.clone(),
            api_key: config.require_key("vision")?.to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn build_request(&self, image: &[u8]) -> ChatCompletionRequest {
        let encoded = STANDARD.encode(image);
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": DETECTION_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", image_mime_type(image), encoded) }
                    }
                ]
            })],
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

#[async_trait]
impl DetectionProvider for VisionDetectionClient {
    async fn identify(&self, image: &[u8]) -> AppResult<String> {
        if image.is_empty() {
            return Err(AppError::invalid_input("image", "Image is empty"));
        }
        tracing::debug!(bytes = image.len(), model = %self.model, "Vision request");

        let response = self
            .client
            .post(&self.api_endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(image))
            .send()
            .await
            .map_err(|e| request_error(Upstream::Vision, e))?;

        let result: ChatCompletionResponse = ensure_success(Upstream::Vision, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                AppError::upstream(Upstream::Vision, format!("Failed to parse response: {}", e))
            })?;

        completion_text(result)
    }
}

/// Text of the first choice; an empty completion is an upstream failure
pub fn completion_text(result: ChatCompletionResponse) -> AppResult<String> {
    result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::upstream(Upstream::Vision, "empty completion"))
}

/// Sniff the image format from its magic bytes; JPEG when unknown
pub fn image_mime_type(image: &[u8]) -> &'static str {
    match image {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}
