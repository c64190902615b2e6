use actix_web::web;
use futures::future::join_all;
use futures::FutureExt;
use shared::{AggregatedReport, ProviderResult};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use url::Url;

use super::{DetectionProvider, DetectionRequest};
use crate::metadata::{extract_metadata, MetadataReport};
use crate::storage::upload_store::{StorageError, UploadStore};

pub const GOOGLE_REVERSE_SEARCH_URL: &str = "https://www.google.com/searchbyimage";

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Uploaded file is empty")]
    EmptyContent,
    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),
    #[error("Failed to build reverse search URL: {0}")]
    SearchUrl(#[from] url::ParseError),
}

/// Fans one upload out to every configured provider and the EXIF reader, then
/// assembles the report in provider configuration order.
pub struct DetectionAggregator {
    providers: Vec<Arc<dyn DetectionProvider>>,
    store: UploadStore,
}

impl DetectionAggregator {
    pub fn new(providers: Vec<Arc<dyn DetectionProvider>>, store: UploadStore) -> Self {
        Self { providers, store }
    }

    pub fn providers(&self) -> &[Arc<dyn DetectionProvider>] {
        &self.providers
    }

    pub async fn analyze(&self, request: DetectionRequest) -> Result<AggregatedReport, AnalyzeError> {
        if request.content.is_empty() {
            return Err(AnalyzeError::EmptyContent);
        }
        log::info!(
            "Analyzing {} ({}, {} bytes) with {} provider(s)",
            request.filename,
            request.mime_type,
            request.content.len(),
            self.providers.len()
        );

        let detections = join_all(
            self.providers
                .iter()
                .map(|provider| run_provider(provider.as_ref(), &request)),
        );

        let content = request.content.clone();
        let metadata = async move {
            web::block(move || extract_metadata(&content))
                .await
                .unwrap_or_else(|e| {
                    log::error!("EXIF extraction task failed: {}", e);
                    MetadataReport::unavailable()
                })
        };

        let stored = self.store.save(&request.content, &request.filename);

        let (aggregated_results, metadata, stored) = futures::join!(detections, metadata, stored);
        let stored = stored?;
        log::info!("Stored {} at {}", request.filename, stored.path.display());

        Ok(AggregatedReport {
            filename: request.filename,
            aggregated_results,
            exif_data: metadata.html,
            google_reverse_search_url: reverse_search_url(&stored.public_url)?,
            gps_coordinates: metadata.coordinates,
        })
    }
}

/// Runs one provider to completion. Errors and panics become a Failed entry.
async fn run_provider(provider: &dyn DetectionProvider, request: &DetectionRequest) -> ProviderResult {
    let name = provider.name();
    if !provider.is_configured() {
        log::debug!("Skipping {}: credentials not configured", name);
        return ProviderResult::not_configured(name);
    }

    match AssertUnwindSafe(provider.detect(request)).catch_unwind().await {
        Ok(Ok(detection)) => {
            log::info!(
                "{} verdict: {} ({:?})",
                name,
                detection.verdict,
                detection.confidence
            );
            ProviderResult::success(name, detection.verdict, detection.confidence)
        }
        Ok(Err(e)) => {
            log::error!("{} detection failed: {}", name, e);
            ProviderResult::failed(name, e.to_string())
        }
        Err(_) => {
            log::error!("{} detection panicked", name);
            ProviderResult::failed(name, "provider task panicked")
        }
    }
}

pub fn reverse_search_url(public_url: &Url) -> Result<String, url::ParseError> {
    let url = Url::parse_with_params(
        GOOGLE_REVERSE_SEARCH_URL,
        &[("image_url", public_url.as_str())],
    )?;
    Ok(url.into())
}
