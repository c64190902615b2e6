use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;

use super::normalize::passthrough;
use super::{endpoint, send_json, Detection, DetectionProvider, DetectionRequest, ProviderError};
use crate::config::AiOrNotConfig;

const IMAGE_SYNC_PATH: &str = "v2/image/sync";

#[derive(Debug, Deserialize)]
struct AiOrNotResponse {
    report: Option<Report>,
}

#[derive(Debug, Deserialize)]
struct Report {
    ai_generated: Option<AiGenerated>,
}

#[derive(Debug, Deserialize)]
struct AiGenerated {
    verdict: Option<String>,
    ai: Option<AiScore>,
}

#[derive(Debug, Deserialize)]
struct AiScore {
    confidence: Option<f64>,
}

/// AI or Not image API. Bearer auth, file under the `image` field, discrete
/// verdict passed through.
pub struct AiOrNotProvider {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AiOrNotProvider {
    pub fn new(http_client: Client, config: &AiOrNotConfig) -> Self {
        Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    fn parse(response: AiOrNotResponse) -> Result<Detection, ProviderError> {
        let ai_generated = response
            .report
            .and_then(|r| r.ai_generated)
            .ok_or(ProviderError::MissingField("report.ai_generated"))?;

        Ok(passthrough(
            ai_generated.verdict.as_deref(),
            ai_generated.ai.and_then(|a| a.confidence),
        ))
    }
}

#[async_trait]
impl DetectionProvider for AiOrNotProvider {
    fn name(&self) -> &str {
        "aiornot"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn detect(&self, request: &DetectionRequest) -> Result<Detection, ProviderError> {
        // Video needs an upload-then-poll flow that this client does not implement.
        if !request.is_image() {
            return Err(ProviderError::UnsupportedMedia(request.mime_type.clone()));
        }
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let form = Form::new().part("image", request.file_part()?);
        let response: AiOrNotResponse = send_json(
            self.http_client
                .post(endpoint(&self.base_url, IMAGE_SYNC_PATH))
                .bearer_auth(api_key)
                .header("accept", "application/json")
                .multipart(form),
        )
        .await?;

        Self::parse(response)
    }
}
