//! Request dispatcher.
//!
//! Windows the transcript, hands the turn to the generation provider, and
//! retries network-level failures with capped exponential backoff. HTTP-level
//! failures are structural and go back to the caller after a single attempt.

use crate::models::ChatMessage;
use crate::services::providers::{
    ApiErrorKind, GenerationProvider, GenerationRequest, GenerationResult,
};
use chat_core::retry::RetryConfig;
use std::sync::Arc;
use tokio::time::sleep;

/// Prior turns kept when forming outbound history.
pub const HISTORY_WINDOW: usize = 5;

/// Literal result text when every attempt failed at the network level.
pub const CALL_FAILED_TEXT: &str = "call failed";

/// Literal result text when the attempt loop ends without a verdict.
pub const UNKNOWN_FAILURE_TEXT: &str = "unknown failure";

/// Stateless dispatcher for generation calls.
///
/// The transcript is owned by the caller and passed in per call; the
/// dispatcher only truncates it to the history window.
pub struct Dispatcher {
    provider: Arc<dyn GenerationProvider>,
    retry: RetryConfig,
    system_prompt: String,
    grounding_enabled: bool,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        retry: RetryConfig,
        system_prompt: impl Into<String>,
        grounding_enabled: bool,
    ) -> Self {
        Self {
            provider,
            retry,
            system_prompt: system_prompt.into(),
            grounding_enabled,
        }
    }

    /// Send one chat turn upstream.
    ///
    /// `history` holds the prior turns, oldest first; only the last
    /// [`HISTORY_WINDOW`] of them are sent, with `prompt` appended last.
    pub async fn dispatch(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<GenerationResult, ApiErrorKind> {
        let window_start = history.len().saturating_sub(HISTORY_WINDOW);
        let request = GenerationRequest {
            system_prompt: self.system_prompt.clone(),
            history: history[window_start..].to_vec(),
            prompt: prompt.to_string(),
            grounding_enabled: self.grounding_enabled,
        };

        for attempt in 0..self.retry.max_retries {
            match self.provider.generate(&request).await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            "Generation succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(kind) if !kind.is_transient() => {
                    tracing::warn!(
                        error = %kind,
                        "Generation failed with non-retryable error"
                    );
                    return Err(kind);
                }
                Err(kind) => {
                    if attempt + 1 >= self.retry.max_retries {
                        tracing::warn!(
                            attempts = self.retry.max_retries,
                            error = %kind,
                            "Generation failed after exhausting retries"
                        );
                        return Ok(GenerationResult::text_only(CALL_FAILED_TEXT));
                    }

                    let backoff = self.retry.backoff_duration(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %kind,
                        "Network failure, retrying after backoff"
                    );
                    sleep(backoff).await;
                }
            }
        }

        // Reachable only with a zero-attempt retry config.
        Ok(GenerationResult::text_only(UNKNOWN_FAILURE_TEXT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockProvider;
    use crate::services::providers::SourceAttribution;
    use std::time::Duration;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn dispatcher_with(provider: Arc<MockProvider>, retry: RetryConfig) -> Dispatcher {
        Dispatcher::new(provider, retry, "test instruction", true)
    }

    fn network_err() -> Result<GenerationResult, ApiErrorKind> {
        Err(ApiErrorKind::Network("connection reset".to_string()))
    }

    #[tokio::test]
    async fn long_histories_are_truncated_to_the_window() {
        let provider = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(5));

        let history: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();

        dispatcher.dispatch("latest", &history).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].history.len(), HISTORY_WINDOW);
        assert_eq!(requests[0].history[0].content, "turn 3");
        assert_eq!(requests[0].history[4].content, "turn 7");
        assert_eq!(requests[0].prompt, "latest");
    }

    #[tokio::test]
    async fn short_histories_are_sent_whole() {
        let provider = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(5));

        let history = vec![ChatMessage::user("only one")];
        dispatcher.dispatch("latest", &history).await.unwrap();

        assert_eq!(provider.requests()[0].history.len(), 1);
    }

    #[tokio::test]
    async fn network_failures_are_retried_until_success() {
        let provider = Arc::new(MockProvider::with_outcomes(vec![
            network_err(),
            network_err(),
            network_err(),
            Ok(GenerationResult::text_only("finally")),
        ]));
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(5));

        let result = dispatcher.dispatch("hello", &[]).await.unwrap();

        assert_eq!(result.text, "finally");
        assert_eq!(provider.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_double_per_attempt() {
        let provider = Arc::new(MockProvider::with_outcomes(vec![
            network_err(),
            network_err(),
            network_err(),
            Ok(GenerationResult::text_only("finally")),
        ]));
        let dispatcher = dispatcher_with(provider.clone(), RetryConfig::default());

        let started = tokio::time::Instant::now();
        let result = dispatcher.dispatch("hello", &[]).await.unwrap();

        // 1s + 2s + 4s of virtual time.
        assert_eq!(result.text, "finally");
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn exhausted_retries_return_the_literal_failure_text() {
        let provider = Arc::new(MockProvider::with_outcomes(vec![
            network_err(),
            network_err(),
            network_err(),
        ]));
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(3));

        let result = dispatcher.dispatch("hello", &[]).await.unwrap();

        assert_eq!(result.text, CALL_FAILED_TEXT);
        assert!(result.sources.is_empty());
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn quota_errors_short_circuit_without_retry() {
        let provider = Arc::new(MockProvider::with_outcomes(vec![Err(
            ApiErrorKind::ResourceExhausted("quota".to_string()),
        )]));
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(5));

        let err = dispatcher.dispatch("hello", &[]).await.unwrap_err();

        assert!(matches!(err, ApiErrorKind::ResourceExhausted(_)));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn auth_errors_are_not_classified_as_network() {
        let provider = Arc::new(MockProvider::with_outcomes(vec![Err(
            ApiErrorKind::Unauthenticated("bad key".to_string()),
        )]));
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(5));

        let err = dispatcher.dispatch("hello", &[]).await.unwrap_err();

        assert!(matches!(err, ApiErrorKind::Unauthenticated(_)));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn sources_pass_through_untouched() {
        let sources = vec![SourceAttribution {
            title: "Example".to_string(),
            uri: "https://example.com".to_string(),
        }];
        let provider = Arc::new(MockProvider::with_outcomes(vec![Ok(GenerationResult {
            text: "grounded".to_string(),
            sources: sources.clone(),
        })]));
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(5));

        let result = dispatcher.dispatch("hello", &[]).await.unwrap();

        assert_eq!(result.sources, sources);
    }

    #[tokio::test]
    async fn zero_attempt_config_hits_the_defensive_fallback() {
        let provider = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(provider.clone(), fast_retry(0));

        let result = dispatcher.dispatch("hello", &[]).await.unwrap();

        assert_eq!(result.text, UNKNOWN_FAILURE_TEXT);
        assert_eq!(provider.request_count(), 0);
    }
}
