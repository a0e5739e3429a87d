//! `OpenAI` provider implementation.
//!
//! Whisper for transcription, chat completions in JSON mode for extraction,
//! `text-embedding-3-small` for embeddings, and plain chat completions for
//! grounded answers.

use emergency_line_report_models::EMBEDDING_DIM;
use serde::{Deserialize, Serialize};

use crate::extraction::build_extraction_prompt;
use crate::{AiError, AiProvider, Transcription};

/// Transcription model. Voice notes arrive as OGG/Opus and Whisper accepts
/// them directly.
const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Embedding model. Fixed: its 1536-dimensional output is baked into the
/// `vector(1536)` column, and queries must embed with the identical model.
const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// `OpenAI` API provider.
pub struct OpenAiProvider {
    api_key: String,
    chat_model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new `OpenAI` provider.
    #[must_use]
    pub fn new(api_key: String, chat_model: String) -> Self {
        Self {
            api_key,
            chat_model,
            client: reqwest::Client::new(),
        }
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        json_mode: bool,
        temperature: f64,
    ) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            response_format: json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            temperature,
            max_tokens: 800,
        };

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let response: ChatResponse = serde_json::from_str(&body)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Provider {
                message: "No choices in OpenAI response".to_string(),
            })?;

        Ok(content)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

#[derive(Deserialize)]
struct TranscriptionSegment {
    avg_logprob: f64,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait::async_trait]
impl AiProvider for OpenAiProvider {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription, AiError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.ogg")
            .mime_str("audio/ogg")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", TRANSCRIPTION_MODEL)
            .text("language", "es")
            .text("response_format", "verbose_json");

        let resp = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let response: TranscriptionResponse = serde_json::from_str(&body)?;

        Ok(Transcription {
            confidence: confidence_from_segments(&response.segments),
            text: response.text,
        })
    }

    async fn extract_emergency(&self, transcript: &str) -> Result<serde_json::Value, AiError> {
        let prompt = build_extraction_prompt(transcript);

        let content = self
            .chat(
                vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                true,
                0.2,
            )
            .await?;

        Ok(serde_json::from_str(&content)?)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: text,
        };

        let resp = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let response: EmbeddingResponse = serde_json::from_str(&body)?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AiError::Provider {
                message: "No embedding in OpenAI response".to_string(),
            })?;

        if embedding.len() != EMBEDDING_DIM {
            return Err(AiError::Provider {
                message: format!(
                    "Embedding has {} dimensions, expected {EMBEDDING_DIM}",
                    embedding.len()
                ),
            });
        }

        Ok(embedding)
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError> {
        self.chat(
            vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            false,
            0.3,
        )
        .await
    }
}

/// Maps Whisper's per-segment average log-probabilities onto the 0-100
/// confidence scale stored with each report.
fn confidence_from_segments(segments: &[TranscriptionSegment]) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_logprob =
        segments.iter().map(|s| s.avg_logprob).sum::<f64>() / segments.len() as f64;

    (mean_logprob.exp() * 100.0).clamp(0.0, 100.0)
}

/// Extracts the provider's error message from a failed response body.
fn provider_error(status: reqwest::StatusCode, body: &str) -> AiError {
    let err: OpenAiError = serde_json::from_str(body).unwrap_or_else(|_| OpenAiError {
        error: OpenAiErrorDetail {
            message: format!("HTTP {status}: {body}"),
        },
    });
    AiError::Provider {
        message: err.error.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_zero_without_segments() {
        assert!((confidence_from_segments(&[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_maps_logprobs_to_percent() {
        // avg_logprob = 0 means the decoder was certain
        let certain = [TranscriptionSegment { avg_logprob: 0.0 }];
        assert!((confidence_from_segments(&certain) - 100.0).abs() < f64::EPSILON);

        let shaky = [
            TranscriptionSegment { avg_logprob: -0.5 },
            TranscriptionSegment { avg_logprob: -1.5 },
        ];
        let confidence = confidence_from_segments(&shaky);
        assert!(confidence > 0.0 && confidence < 100.0);
    }

    #[test]
    fn provider_error_prefers_api_message() {
        let body = r#"{"error":{"message":"Rate limit reached"}}"#;
        let err = provider_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert!(err.to_string().contains("Rate limit reached"));
    }

    #[test]
    fn provider_error_falls_back_to_status_line() {
        let err = provider_error(reqwest::StatusCode::BAD_GATEWAY, "upstream exploded");
        assert!(err.to_string().contains("502"));
    }
}
