//! WithBugs' Bot - a menu-driven chat bot
//!
//! Serves the channel messaging endpoint and routes each conversation
//! through a stack of dialog flows: a main menu, an echo skill and a car
//! recognition skill backed by Custom Vision.

mod api;
mod db;
mod dialog;
mod runtime;
mod vision;

use api::{create_router, AppState};
use db::Database;
use dialog::{CarRecognitionSettings, FlowRegistry};
use runtime::{CustomVisionClassifier, DatabaseStore, HttpAttachmentFetcher, RuntimeManager};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vision::{
    AttachmentClient, ClassificationProject, CustomVisionService, LoggingService,
    UnavailableService, VisionConfig, VisionService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "withbugs_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("BOT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3978);

    let idle_timeout = std::env::var("BOT_IDLE_TIMEOUT_SECS")
        .ok()
        .and_then(|secs| secs.parse().ok())
        .filter(|secs: &u64| *secs > 0)
        .map_or(runtime::DEFAULT_IDLE_TIMEOUT, Duration::from_secs);

    let db = match std::env::var("BOT_DB_PATH") {
        Ok(db_path) => {
            // Ensure database directory exists
            if let Some(parent) = PathBuf::from(&db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %db_path, "Opening database");
            Database::open(&db_path)?
        }
        Err(_) => {
            tracing::info!("BOT_DB_PATH not set, conversation state is kept in memory");
            Database::open_in_memory()?
        }
    };
    tracing::info!(conversations = db.count_states()?, "Conversation store ready");

    // Classifier
    let classify_timeout = vision::request_timeout(|name| std::env::var(name).ok());
    let (service, settings) = build_classifier();
    let classifier = CustomVisionClassifier::new(Arc::new(LoggingService::new(service)));
    let fetcher = HttpAttachmentFetcher::new(AttachmentClient::new(classify_timeout)?);

    // Create application state
    let runtime = RuntimeManager::new(
        Arc::new(DatabaseStore::new(db)),
        Arc::new(classifier),
        Arc::new(fetcher),
        FlowRegistry::new(settings),
    )
    .with_classify_timeout(classify_timeout)
    .with_idle_timeout(idle_timeout);
    let state = AppState::new(runtime);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("WithBugs' Bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the Custom Vision client, or a stand-in that always fails when the
/// configuration is incomplete. The bot starts either way.
fn build_classifier() -> (Arc<dyn VisionService>, CarRecognitionSettings) {
    let config = match VisionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Custom Vision not configured, car recognition will fail");
            return (
                Arc::new(UnavailableService::new(e.to_string())),
                CarRecognitionSettings::unconfigured(),
            );
        }
    };

    let settings = CarRecognitionSettings::new(
        ClassificationProject::new(config.project_id, config.published_name.clone()),
        config.probability_threshold,
    );

    match CustomVisionService::new(&config) {
        Ok(service) => {
            tracing::info!(
                endpoint = %config.endpoint,
                project_id = %config.project_id,
                published_name = %config.published_name,
                threshold = config.probability_threshold,
                training_key = config.training_key.is_some(),
                "Custom Vision configured"
            );
            (Arc::new(service), settings)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Custom Vision client");
            (Arc::new(UnavailableService::new(e.to_string())), settings)
        }
    }
}
