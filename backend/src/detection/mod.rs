pub mod aggregator;
pub mod aiornot;
pub mod hive;
pub mod normalize;
pub mod sightengine;

#[cfg(test)]
pub(crate) mod test_support;

use actix_web::web::Bytes;
use async_trait::async_trait;
use reqwest::multipart::Part;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{Confidence, Verdict};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ProviderKind, ProvidersConfig};
use aiornot::AiOrNotProvider;
use hive::HiveProvider;
use sightengine::SightengineProvider;

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Response missing {0}")]
    MissingField(&'static str),
    #[error("Score out of range: {0}")]
    InvalidScore(f64),
    #[error("Provider rejected the request: {0}")]
    Rejected(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),
}

/// Request URLs can carry credentials in the query string, so they are
/// stripped before the error is logged or reported.
impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.without_url())
    }
}

/// One uploaded file, shared read-only by every provider task.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub content: Bytes,
    pub filename: String,
    pub mime_type: String,
}

impl DetectionRequest {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub(crate) fn file_part(&self) -> Result<Part, ProviderError> {
        Ok(Part::bytes(self.content.to_vec())
            .file_name(self.filename.clone())
            .mime_str(&self.mime_type)?)
    }
}

/// A provider answer mapped onto the common verdict/confidence shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub verdict: Verdict,
    pub confidence: Confidence,
}

#[async_trait]
pub trait DetectionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// False when credentials are missing; such providers are never called.
    fn is_configured(&self) -> bool;

    async fn detect(&self, request: &DetectionRequest) -> Result<Detection, ProviderError>;
}

/// Builds the configured providers in declaration order, sharing one HTTP client.
pub fn build_providers(
    config: &ProvidersConfig,
) -> Result<Vec<Arc<dyn DetectionProvider>>, ProviderError> {
    let http_client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    Ok(config
        .order
        .iter()
        .map(|kind| -> Arc<dyn DetectionProvider> {
            match kind {
                ProviderKind::AiOrNot => {
                    Arc::new(AiOrNotProvider::new(http_client.clone(), &config.aiornot))
                }
                ProviderKind::Hive => Arc::new(HiveProvider::new(http_client.clone(), &config.hive)),
                ProviderKind::Sightengine => Arc::new(SightengineProvider::new(
                    http_client.clone(),
                    &config.sightengine,
                )),
            }
        })
        .collect())
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Sends `request` and decodes a 2xx JSON body into `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    Ok(serde_json::from_str(&body)?)
}
