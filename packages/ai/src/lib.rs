#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AI provider wrappers for the ingestion and query pipelines.
//!
//! One [`AiProvider`] trait covers the four external capabilities the system
//! consumes: speech-to-text, structured extraction, embeddings, and grounded
//! completions. [`openai::OpenAiProvider`] implements it against the `OpenAI`
//! REST API; [`mock::MockProvider`] implements it with deterministic canned
//! output so the process runs without credentials (and so tests can
//! substitute either the whole provider or single capabilities).

pub mod extraction;
pub mod mock;
pub mod openai;

use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },
}

/// A transcribed voice message.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    /// The transcript text.
    pub text: String,
    /// Confidence score, 0-100.
    pub confidence: f64,
}

/// The four external AI capabilities consumed by the pipelines.
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Transcribes a voice message (Spanish) to text with a confidence
    /// score.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription, AiError>;

    /// Extracts the structured emergency record from a transcript.
    ///
    /// Returns the model's raw JSON output; validation against the fixed
    /// schema happens in [`extraction::parse_extraction`], so a partially
    /// filled response is a degraded result rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the output is not JSON.
    async fn extract_emergency(&self, transcript: &str) -> Result<serde_json::Value, AiError>;

    /// Embeds text into the report embedding space
    /// ([`emergency_line_report_models::EMBEDDING_DIM`] dimensions).
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the vector has the wrong
    /// dimensionality.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;

    /// Runs a grounded completion with the given system instruction.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError>;
}

/// Creates an AI provider from environment variables.
///
/// Uses [`openai::OpenAiProvider`] when `OPENAI_API_KEY` is set (chat model
/// overridable via `AI_MODEL`). Without a key the process must still come
/// up — webhook verification and the read-only endpoints don't need AI — so
/// this falls back to [`mock::MockProvider`] with a warning instead of
/// failing.
#[must_use]
pub fn create_provider_from_env() -> Box<dyn AiProvider> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
            Box::new(openai::OpenAiProvider::new(api_key, model))
        }
        _ => {
            log::warn!(
                "OPENAI_API_KEY not set. Running with the mock AI provider: \
                 transcription, extraction, and query answers will be canned."
            );
            Box::new(mock::MockProvider::new())
        }
    }
}
