//! Generation provider abstractions and implementations.
//!
//! This module provides a trait-based abstraction between the chat handlers
//! and the hosted model API, allowing the Gemini backend to be swapped for a
//! mock in tests.

pub mod gemini;
pub mod mock;

use crate::models::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes for a generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("quota exhausted: {0}")]
    ResourceExhausted(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ApiErrorKind {
    /// Whether a retry could plausibly succeed.
    ///
    /// Auth and quota failures are structural, not transient; only
    /// network-level failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiErrorKind::Network(_))
    }

    /// Remediation hint surfaced to the user alongside the error message.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ApiErrorKind::Unauthenticated(_) | ApiErrorKind::PermissionDenied(_) => Some(
                "Check that the API key has not expired or been revoked, \
                 and that billing is active for the project.",
            ),
            ApiErrorKind::ResourceExhausted(_) => Some(
                "The usage quota is exhausted. Wait a moment before retrying, \
                 or raise the quota in the console.",
            ),
            ApiErrorKind::Api { .. } => Some(
                "If the key carries IP or referrer restrictions, try removing \
                 them; hosted front-ends call from changing addresses.",
            ),
            ApiErrorKind::Network(_) | ApiErrorKind::Unknown(_) => None,
        }
    }
}

/// Input to a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Fixed instruction sent with every call.
    pub system_prompt: String,
    /// Prior turns, oldest first. Already truncated by the dispatcher.
    pub history: Vec<ChatMessage>,
    /// The new user turn, appended last on the wire.
    pub prompt: String,
    /// Whether to declare the web search tool.
    pub grounding_enabled: bool,
}

/// A citation attached to a grounded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub title: String,
    pub uri: String,
}

/// Outcome of a successful generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Answer text.
    pub text: String,
    /// Grounding citations; empty when the answer was not grounded.
    pub sources: Vec<SourceAttribution>,
}

impl GenerationResult {
    /// A result carrying only literal text, no citations.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Trait for text generation backends.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Run one generation attempt. Never retries internally.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResult, ApiErrorKind>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ApiErrorKind>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_transient() {
        assert!(ApiErrorKind::Network("reset".into()).is_transient());
        assert!(!ApiErrorKind::Unauthenticated("bad key".into()).is_transient());
        assert!(!ApiErrorKind::PermissionDenied("denied".into()).is_transient());
        assert!(!ApiErrorKind::ResourceExhausted("quota".into()).is_transient());
        assert!(!ApiErrorKind::Api {
            status: 500,
            message: "boom".into()
        }
        .is_transient());
        assert!(!ApiErrorKind::Unknown("??".into()).is_transient());
    }

    #[test]
    fn structural_errors_carry_remediation_hints() {
        assert!(ApiErrorKind::Unauthenticated("bad key".into())
            .remediation()
            .unwrap()
            .contains("billing"));
        assert!(ApiErrorKind::ResourceExhausted("quota".into())
            .remediation()
            .unwrap()
            .contains("quota"));
        assert!(ApiErrorKind::Network("reset".into()).remediation().is_none());
    }
}
