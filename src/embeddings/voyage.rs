//! Client for the Voyage multimodal embeddings endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Embedding, EmbeddingGateway, GatewayError, InputType};
use crate::images::EncodedPayload;

/// Error bodies are cut to this many characters before being reported
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
pub struct MultimodalRequest<'a> {
    pub inputs: Vec<MultimodalInput<'a>>,
    pub model: &'a str,
    pub input_type: InputType,
}

#[derive(Debug, Serialize)]
pub struct MultimodalInput<'a> {
    pub content: Vec<ContentPiece<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPiece<'a> {
    Text { text: &'a str },
    ImageBase64 { image_base64: &'a str },
}

#[derive(Debug, Deserialize)]
pub struct MultimodalResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub text_tokens: u64,
    #[serde(default)]
    pub image_pixels: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl<'a> MultimodalRequest<'a> {
    pub fn single(model: &'a str, input_type: InputType, piece: ContentPiece<'a>) -> Self {
        Self {
            inputs: vec![MultimodalInput {
                content: vec![piece],
            }],
            model,
            input_type,
        }
    }
}

impl MultimodalResponse {
    /// Checks the response carries usable vectors and returns the first one.
    pub fn into_first_embedding(mut self) -> Result<Vec<f32>, GatewayError> {
        if self.data.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "response contains no embeddings".to_string(),
            ));
        }

        self.data.sort_by_key(|d| d.index);

        let dimensions = self.data[0].embedding.len();
        if dimensions == 0 {
            return Err(GatewayError::InvalidResponse(
                "embedding vector is empty".to_string(),
            ));
        }
        if let Some(other) = self.data.iter().find(|d| d.embedding.len() != dimensions) {
            return Err(GatewayError::InvalidResponse(format!(
                "inconsistent dimensions: {} vs {}",
                dimensions,
                other.embedding.len()
            )));
        }

        Ok(self.data.swap_remove(0).embedding)
    }
}

/// Blocking HTTP client for the multimodal embeddings API.
pub struct VoyageClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl VoyageClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.strip_suffix('/').unwrap_or(base_url);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{base_url}/multimodalembeddings"),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, input_type: InputType, piece: ContentPiece) -> Result<Embedding, GatewayError> {
        let request = MultimodalRequest::single(&self.model, input_type, piece);

        log::debug!(
            "POST {} model={} input_type={:?}",
            self.endpoint,
            self.model,
            input_type
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            log::error!("embedding request failed: status={status}");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let text = response.text()?;
        let parsed = serde_json::from_str::<MultimodalResponse>(&text).map_err(|err| {
            log::error!("{err}. tried to parse: {text:?}");
            GatewayError::InvalidResponse(err.to_string())
        })?;

        if let Some(usage) = &parsed.usage {
            log::debug!(
                "usage model={} text_tokens={} image_pixels={} total_tokens={}",
                parsed.model.as_deref().unwrap_or("unknown"),
                usage.text_tokens,
                usage.image_pixels,
                usage.total_tokens
            );
        }

        let vector = parsed.into_first_embedding()?;
        Ok(Embedding::new(vector, input_type))
    }
}

impl EmbeddingGateway for VoyageClient {
    fn embed_document(&self, payload: &EncodedPayload) -> Result<Embedding, GatewayError> {
        if payload.data.is_empty() {
            return Err(GatewayError::EmptyInput);
        }
        self.embed(
            InputType::Document,
            ContentPiece::ImageBase64 {
                image_base64: &payload.data_url,
            },
        )
    }

    fn embed_query(&self, text: &str) -> Result<Embedding, GatewayError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GatewayError::EmptyInput);
        }
        self.embed(InputType::Query, ContentPiece::Text { text })
    }
}
