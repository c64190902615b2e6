use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;

use super::normalize::classify_probability;
use super::{endpoint, send_json, Detection, DetectionProvider, DetectionRequest, ProviderError};
use crate::config::HiveConfig;

const SYNC_TASK_PATH: &str = "api/v2/task/sync";
const AI_GENERATED_CLASS: &str = "ai_generated";

#[derive(Debug, Deserialize)]
struct HiveResponse {
    #[serde(default)]
    status: Vec<HiveTask>,
}

#[derive(Debug, Deserialize)]
struct HiveTask {
    response: Option<HiveTaskResponse>,
}

#[derive(Debug, Deserialize)]
struct HiveTaskResponse {
    #[serde(default)]
    output: Vec<HiveOutput>,
}

#[derive(Debug, Deserialize)]
struct HiveOutput {
    #[serde(default)]
    classes: Vec<HiveClass>,
}

#[derive(Debug, Deserialize)]
struct HiveClass {
    class: String,
    score: f64,
}

pub struct HiveProvider {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl HiveProvider {
    pub fn new(http_client: Client, config: &HiveConfig) -> Self {
        Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    fn ai_probability(response: &HiveResponse) -> Option<f64> {
        response
            .status
            .first()?
            .response
            .as_ref()?
            .output
            .first()?
            .classes
            .iter()
            .find(|c| c.class == AI_GENERATED_CLASS)
            .map(|c| c.score)
    }
}

#[async_trait]
impl DetectionProvider for HiveProvider {
    fn name(&self) -> &str {
        "hive"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn detect(&self, request: &DetectionRequest) -> Result<Detection, ProviderError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let form = Form::new().part("media", request.file_part()?);
        let response: HiveResponse = send_json(
            self.http_client
                .post(endpoint(&self.base_url, SYNC_TASK_PATH))
                .header("Authorization", format!("Token {}", api_key))
                .header("accept", "application/json")
                .multipart(form),
        )
        .await?;

        let p = Self::ai_probability(&response)
            .ok_or(ProviderError::MissingField("status[0].response.output[0].classes.ai_generated"))?;
        classify_probability(p)
    }
}
