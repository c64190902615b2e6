use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;

use super::normalize::classify_probability;
use super::{endpoint, send_json, Detection, DetectionProvider, DetectionRequest, ProviderError};
use crate::config::SightengineConfig;

const CHECK_PATH: &str = "1.0/check.json";
const GENAI_MODEL: &str = "genai";

#[derive(Debug, Deserialize)]
struct SightengineResponse {
    status: Option<String>,
    #[serde(rename = "type")]
    kind: Option<SightengineType>,
    error: Option<SightengineError>,
}

#[derive(Debug, Deserialize)]
struct SightengineType {
    ai_generated: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SightengineError {
    message: Option<String>,
}

/// Sightengine `genai` model. Credentials travel as query parameters and the
/// file goes under the `media` field.
pub struct SightengineProvider {
    http_client: Client,
    api_user: Option<String>,
    api_secret: Option<String>,
    base_url: String,
}

impl SightengineProvider {
    pub fn new(http_client: Client, config: &SightengineConfig) -> Self {
        Self {
            http_client,
            api_user: config.api_user.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.base_url.clone(),
        }
    }

    fn parse(response: SightengineResponse) -> Result<Detection, ProviderError> {
        if response.status.as_deref() == Some("failure") {
            let message = response
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ProviderError::Rejected(message));
        }

        let p = response
            .kind
            .and_then(|t| t.ai_generated)
            .ok_or(ProviderError::MissingField("type.ai_generated"))?;
        classify_probability(p)
    }
}

#[async_trait]
impl DetectionProvider for SightengineProvider {
    fn name(&self) -> &str {
        "sightengine"
    }

    fn is_configured(&self) -> bool {
        self.api_user.is_some() && self.api_secret.is_some()
    }

    async fn detect(&self, request: &DetectionRequest) -> Result<Detection, ProviderError> {
        let api_user = self.api_user.as_deref().unwrap_or_default();
        let api_secret = self.api_secret.as_deref().unwrap_or_default();

        let form = Form::new().part("media", request.file_part()?);
        let response: SightengineResponse = send_json(
            self.http_client
                .post(endpoint(&self.base_url, CHECK_PATH))
                .query(&[
                    ("models", GENAI_MODEL),
                    ("api_user", api_user),
                    ("api_secret", api_secret),
                ])
                .multipart(form),
        )
        .await?;

        Self::parse(response)
    }
}
