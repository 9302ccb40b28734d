use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plant_disease_service::api::{self, AppState};
use plant_disease_service::config::Config;
use plant_disease_service::labels::LabelSet;
use plant_disease_service::metadata::MetadataStore;
use plant_disease_service::model::Classifier;
use plant_disease_service::pipeline::Pipeline;
use plant_disease_service::utils::ensure_file_exists;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;

    info!("Checking model...");
    ensure_file_exists(&config.model_path, config.model_url.as_deref()).await;
    ensure_file_exists(&config.disease_info_path, config.disease_info_url.as_deref()).await;

    let labels = match &config.class_list_path {
        Some(path) => LabelSet::from_file(path)
            .with_context(|| format!("reading class list {}", path.display()))?,
        None => LabelSet::default(),
    };

    let metadata = match MetadataStore::load(&config.disease_info_path) {
        Ok(store) => {
            info!("Loaded {} disease info entries", store.len());
            store
        }
        Err(e) => {
            warn!("Disease info unavailable: {}", e);
            MetadataStore::default()
        }
    };

    let classifier = load_classifier(&config);
    let pipeline = Pipeline::new(classifier, labels, metadata, &config.upload_dir)
        .with_confidence_threshold(config.confidence_threshold);

    let state = Arc::new(AppState {
        pipeline,
        inference_timeout: config.inference_timeout,
    });
    let app = api::router(state, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(feature = "tensorflow")]
fn load_classifier(config: &Config) -> Option<Box<dyn Classifier>> {
    use plant_disease_service::model::TensorFlowClassifier;

    match TensorFlowClassifier::load(
        &config.model_path,
        &config.model_input_op,
        &config.model_output_op,
    ) {
        Ok(model) => {
            info!("Model loaded from {}", config.model_path.display());
            Some(Box::new(model))
        }
        Err(e) => {
            warn!("Model not loaded ({}); predictions are disabled", e);
            None
        }
    }
}

#[cfg(not(feature = "tensorflow"))]
fn load_classifier(_config: &Config) -> Option<Box<dyn Classifier>> {
    warn!("Built without TensorFlow support; predictions are disabled");
    None
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
