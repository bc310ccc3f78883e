//! Common test utilities for chat-frontend integration tests.

use chat_core::config::Config as CommonConfig;
use chat_frontend::config::{ChatConfig, GenerationConfig, GoogleConfig, ModelConfig};
use chat_frontend::startup::Application;
use secrecy::Secret;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,chat_frontend=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Build a test configuration pointing at the given generation endpoint.
pub fn test_config(api_key: &str, api_base_url: &str) -> ChatConfig {
    ChatConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        google: GoogleConfig {
            api_key: Secret::new(api_key.to_string()),
            api_base_url: api_base_url.to_string(),
        },
        models: ModelConfig {
            text_model: "gemini-2.5-flash".to_string(),
        },
        generation: GenerationConfig {
            system_prompt: "You are a test assistant.".to_string(),
            grounding_enabled: true,
            max_retries: 3,
        },
    }
}

/// Spawn the application on a random port and return the port number.
#[allow(dead_code)]
pub async fn spawn_app(config: ChatConfig) -> u16 {
    init_tracing();

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    // Spawn the server in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for server to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    port
}
