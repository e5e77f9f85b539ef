//! Application startup and lifecycle management.

use crate::config::TalespinConfig;
use crate::handlers::{chat, demo, health};
use crate::services::metrics;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::TextProvider;
use crate::services::{GenerationClient, SessionStore, StoryOrchestrator};
use axum::{middleware, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: TalespinConfig,
    pub orchestrator: StoryOrchestrator,
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application, talking to Gemini when an API key is configured.
    pub async fn build(config: TalespinConfig) -> Result<Self, AppError> {
        let provider = text_provider(&config);
        Self::build_with_provider(config, provider).await
    }

    /// Build the application around a given provider (`None` = always fall back).
    pub async fn build_with_provider(
        config: TalespinConfig,
        provider: Option<Arc<dyn TextProvider>>,
    ) -> Result<Self, AppError> {
        metrics::init_metrics().map_err(|e| {
            tracing::error!("Failed to initialize metrics: {}", e);
            AppError::InternalError(anyhow::anyhow!("metrics initialization failed: {}", e))
        })?;

        let generator = GenerationClient::new(provider, config.generation_timeout());
        let store = SessionStore::new(config.session_ttl());
        let orchestrator = StoryOrchestrator::new(store, generator);

        tracing::info!(
            model = %orchestrator.generator().model(),
            generation_configured = orchestrator.generator().is_configured(),
            session_ttl_secs = config.sessions.ttl_secs,
            "Initialized story orchestrator"
        );

        // port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let http_port = listener.local_addr()?.port();
        tracing::info!("Talespin listening on port {}", http_port);

        Ok(Self {
            http_port,
            listener,
            state: AppState {
                config,
                orchestrator,
            },
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            get(chat::readiness).post(chat::chat_completions),
        )
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/voice-demo", get(demo::voice_demo))
        .route("/features", get(demo::features))
        .route("/test-generation", get(demo::test_generation))
        .route("/", get(demo::root))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Gemini when a key is present; otherwise `None` and every story is local.
fn text_provider(config: &TalespinConfig) -> Option<Arc<dyn TextProvider>> {
    let Some(api_key) = config.google.api_key.clone() else {
        tracing::warn!("GOOGLE_API_KEY not set, stories will come from local templates");
        return None;
    };

    let gemini_config = GeminiConfig {
        api_key,
        model: config.models.text_model.clone(),
        api_base: config.google.api_base.clone(),
    };
    match GeminiTextProvider::new(gemini_config) {
        Ok(provider) => {
            tracing::info!(model = %config.models.text_model, "Initialized Gemini text provider");
            Some(Arc::new(provider) as Arc<dyn TextProvider>)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Gemini provider unavailable, using local templates");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
