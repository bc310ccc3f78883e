//! Gemini generation provider.
//!
//! Calls the `generateContent` REST endpoint directly, declaring the web
//! search tool so answers can carry grounding citations.

use super::{
    ApiErrorKind, GenerationProvider, GenerationRequest, GenerationResult, SourceAttribution,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Per-attempt timeout on the generation call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Literal answer used when a success response carries no text part.
pub const EMPTY_ANSWER_FALLBACK: &str = "unable to generate a response";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    /// Overridable for tests; defaults to [`GEMINI_API_BASE`].
    pub api_base_url: String,
}

/// Gemini text generation provider.
#[derive(Clone)]
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base_url,
            self.config.model,
            method,
            self.config.api_key.expose_secret()
        )
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ApiErrorKind> {
        let body = build_request(request);
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            history_len = request.history.len(),
            grounding = request.grounding_enabled,
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiErrorKind::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let kind = classify_status(status, &error_text);
            tracing::warn!(status = %status, error = %kind, "Gemini API returned an error status");
            return Err(kind);
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ApiErrorKind::Unknown(format!("failed to parse response: {}", e)))?;

        Ok(extract_result(api_response))
    }

    async fn health_check(&self) -> Result<(), ApiErrorKind> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(ApiErrorKind::Unauthenticated(
                "Gemini API key not configured".to_string(),
            ));
        }

        Ok(())
    }
}

/// Convert the dispatcher's request into the wire payload.
///
/// History goes first in order, the new user turn is appended last, and the
/// web search tool is declared only when grounding is enabled.
fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|message| Content {
            role: Some(message.role.wire_role().to_string()),
            parts: vec![Part {
                text: message.content.clone(),
            }],
        })
        .collect();

    contents.push(Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: request.prompt.clone(),
        }],
    });

    GenerateContentRequest {
        contents,
        tools: request.grounding_enabled.then(|| {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        }),
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part {
                text: request.system_prompt.clone(),
            }],
        }),
    }
}

/// Map an HTTP error status to a failure class.
fn classify_status(status: StatusCode, body: &str) -> ApiErrorKind {
    let message = parse_error_message(body).unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED => ApiErrorKind::Unauthenticated(message),
        StatusCode::FORBIDDEN => ApiErrorKind::PermissionDenied(message),
        StatusCode::TOO_MANY_REQUESTS => ApiErrorKind::ResourceExhausted(message),
        _ => ApiErrorKind::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull the human-readable message out of the Gemini error envelope.
fn parse_error_message(body: &str) -> Option<String> {
    let wrapper: ErrorWrapper = serde_json::from_str(body).ok()?;
    let status_text = wrapper.error.status.unwrap_or_default();
    let message = wrapper.error.message?;

    if status_text.is_empty() {
        Some(message)
    } else {
        Some(format!("{}: {}", status_text, message))
    }
}

/// Extract answer text and grounding citations from a success response.
fn extract_result(response: GenerateContentResponse) -> GenerationResult {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => return GenerationResult::text_only(EMPTY_ANSWER_FALLBACK),
    };

    let text = match candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.first())
        .and_then(|part| part.text.clone())
    {
        Some(text) => text,
        // No answer text means no citations either.
        None => return GenerationResult::text_only(EMPTY_ANSWER_FALLBACK),
    };

    // Only attributions carrying both a uri and a title are usable as links.
    let sources = candidate
        .grounding_metadata
        .map(|metadata| {
            metadata
                .grounding_attributions
                .into_iter()
                .filter_map(|attribution| {
                    let web = attribution.web?;
                    match (web.title, web.uri) {
                        (Some(title), Some(uri)) => Some(SourceAttribution { title, uri }),
                        _ => None,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    GenerationResult { text, sources }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_attributions: Vec<GroundingAttribution>,
}

#[derive(Debug, Deserialize)]
struct GroundingAttribution {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    #[allow(dead_code)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}
