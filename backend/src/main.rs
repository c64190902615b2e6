mod config;
mod detection;
mod metadata;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use config::AppConfig;
use detection::aggregator::DetectionAggregator;
use detection::build_providers;
use routes::{configure_routes, UploadSettings};
use std::time::Duration;
use storage::upload_store::UploadStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Configuration error: {}", e),
        )
    })?;

    let public_base = config.public_base_url().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, format!("Configuration error: {}", e))
    })?;
    let store = UploadStore::open(&config.storage.upload_dir, public_base)
        .await
        .map_err(|e| {
            log::error!(
                "Failed to prepare upload directory {}: {}",
                config.storage.upload_dir.display(),
                e
            );
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
    log::info!("Storing uploads in {}", store.root().display());

    let providers = build_providers(&config.providers).map_err(|e| {
        log::error!("Failed to build HTTP client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    for provider in &providers {
        if provider.is_configured() {
            log::info!("Detection provider enabled: {}", provider.name());
        } else {
            log::warn!(
                "Detection provider {} has no credentials; it will report NotConfigured",
                provider.name()
            );
        }
    }

    store.clone().spawn_sweeper(
        Duration::from_secs(config.storage.upload_ttl_secs),
        Duration::from_secs(config.storage.sweep_interval_secs),
    );

    let aggregator = web::Data::new(DetectionAggregator::new(providers, store.clone()));
    let settings = web::Data::new(UploadSettings {
        max_upload_bytes: config.storage.max_upload_bytes,
    });
    let upload_dir = store.root().to_path_buf();

    let bind_address = format!("0.0.0.0:{}", config.server.port);
    log::info!("Starting server on {}", bind_address);
    log::info!("Public base URL: {}", config.server.base_url);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(actix_web::middleware::Logger::default())
            .app_data(aggregator.clone())
            .app_data(settings.clone())
            .configure(|cfg| configure_routes(cfg, upload_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
