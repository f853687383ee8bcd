//! cognito-api server binary.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cognito_api::{app, AppState, Settings};
use cognito_core::GenerationBackend;
use cognito_db::{Database, PoolConfig};
use cognito_inference::{GeminiBackend, GeminiConfig, LlmRouter, OllamaBackend};

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "cognito_api=debug,tower_http=debug")
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cognito_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("cognito-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // no ANSI in files unless asked
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

/// Gemini when an API key is configured, Ollama always.
fn build_llm_router(settings: &Settings) -> anyhow::Result<LlmRouter> {
    let cloud: Option<Arc<dyn GenerationBackend>> = match settings.gemini_api_key.as_deref() {
        Some(key) => {
            let config = GeminiConfig::new(key).with_model(settings.gemini_model.clone());
            Some(Arc::new(GeminiBackend::with_config(config)?))
        }
        None => {
            warn!("GEMINI_API_KEY not set, cloud model unavailable");
            None
        }
    };
    let local: Arc<dyn GenerationBackend> = Arc::new(OllamaBackend::with_config(
        &settings.ollama_url,
        &settings.ollama_model,
    )?);
    Ok(LlmRouter::new(cloud, local))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = init_tracing();

    let settings = Settings::from_env();
    if settings.uses_placeholder_secret() {
        warn!("JWT_SECRET is not set, using the development placeholder");
    }
    if settings.google_client_id.is_empty() {
        warn!("GOOGLE_CLIENT_ID is not set, sign-in will fail");
    }

    info!("Connecting to database...");
    let db = Database::connect_with_config(&settings.database_url, PoolConfig::from_env()).await?;
    db.migrate().await?;
    info!("Database migrations applied");

    let llm = build_llm_router(&settings)?;
    let addr = settings.bind_address();
    let state = AppState::new(db, llm, settings)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
