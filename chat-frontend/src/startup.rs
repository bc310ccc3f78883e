//! Application startup and lifecycle management.

use crate::config::ChatConfig;
use crate::handlers::{
    app::{health_check, index, readiness_check},
    chat::chat,
    metrics::metrics,
};
use crate::middleware::metrics::metrics_middleware;
use crate::services::providers::gemini::{GeminiConfig, GeminiProvider};
use crate::services::providers::GenerationProvider;
use crate::services::Dispatcher;
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use chat_core::error::AppError;
use chat_core::middleware::tracing::request_id_middleware;
use chat_core::retry::RetryConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub provider: Arc<dyn GenerationProvider>,
    pub dispatcher: Arc<Dispatcher>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .route("/api/chat", post(chat))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        crate::services::metrics::init_metrics();

        let gemini_config = GeminiConfig {
            api_key: config.google.api_key.clone(),
            model: config.models.text_model.clone(),
            api_base_url: config.google.api_base_url.clone(),
        };
        let provider: Arc<dyn GenerationProvider> = Arc::new(GeminiProvider::new(gemini_config));

        tracing::info!(
            model = %config.models.text_model,
            grounding = config.generation.grounding_enabled,
            "Initialized Gemini provider"
        );

        let dispatcher = Arc::new(Dispatcher::new(
            provider.clone(),
            RetryConfig::with_max_retries(config.generation.max_retries),
            config.generation.system_prompt.clone(),
            config.generation.grounding_enabled,
        ));

        let state = AppState {
            config,
            provider,
            dispatcher,
        };

        // Bind listener (port 0 = random port for testing)
        let address = format!("{}:{}", state.config.common.host, state.config.common.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Chat front-end listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
