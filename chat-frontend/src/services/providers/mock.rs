//! Mock provider implementation for testing.

use super::{ApiErrorKind, GenerationProvider, GenerationRequest, GenerationResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scriptable provider for tests: hands out queued outcomes in order and
/// records every request it receives.
///
/// Once the queue is empty it answers with a canned echo of the prompt, so
/// it can also back a key-less local run.
#[derive(Default)]
pub struct MockProvider {
    outcomes: Mutex<VecDeque<Result<GenerationResult, ApiErrorKind>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the given outcomes, first in first out.
    pub fn with_outcomes(outcomes: Vec<Result<GenerationResult, ApiErrorKind>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append one outcome to the queue.
    pub fn push_outcome(&self, outcome: Result<GenerationResult, ApiErrorKind>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of generation calls received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ApiErrorKind> {
        self.requests.lock().unwrap().push(request.clone());

        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(GenerationResult::text_only(format!(
                    "Mock response for: {}",
                    request.prompt
                )))
            })
    }

    async fn health_check(&self) -> Result<(), ApiErrorKind> {
        Ok(())
    }
}
