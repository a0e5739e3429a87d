//! The ordered ingestion stages.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use emergency_line_ai::extraction::{ExtractionOutcome, parse_extraction};
use emergency_line_ai::{AiProvider, Transcription};
use emergency_line_database::queries;
use emergency_line_database_models::{NewReport, ReportRow};
use emergency_line_whatsapp::WhatsAppClient;
use switchy_database::Database;

use crate::IngestError;

/// Descriptor of one inbound voice message, as parsed from the webhook.
#[derive(Debug, Clone)]
pub struct InboundVoiceMessage {
    /// Sender phone number.
    pub sender: String,
    /// Provider media id of the voice note.
    pub media_id: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

/// Runs the full pipeline for one voice message and returns the persisted
/// report.
///
/// Stage failures before the store write abort the run with nothing
/// persisted. After the write succeeds, alert distribution is spawned as a
/// background task — its failure is logged and never rolls back the report.
///
/// # Errors
///
/// Returns [`IngestError`] if audio fetch, transcription, embedding, or the
/// store write fails, or if the transcript comes back empty.
pub async fn process_voice_message(
    db: Arc<dyn Database>,
    ai: Arc<dyn AiProvider>,
    whatsapp: Arc<WhatsAppClient>,
    message: InboundVoiceMessage,
) -> Result<ReportRow, IngestError> {
    log::info!("Processing voice message from {}", message.sender);

    let audio = whatsapp.download_audio(&message.media_id).await?;

    log::info!("Transcribing {} bytes of audio...", audio.len());
    let transcription = ai.transcribe(&audio).await?;
    if transcription.text.trim().is_empty() {
        log::warn!(
            "Empty transcript for message from {}; dropping",
            message.sender
        );
        return Err(IngestError::EmptyTranscript);
    }

    log::info!("Extracting emergency data...");
    let extraction = run_extraction(ai.as_ref(), &transcription.text).await;

    // The embedding comes from the raw transcript, not the extracted
    // summary, so semantic search matches the caller's own wording.
    log::info!("Generating embedding...");
    let embedding = ai.embed(&transcription.text).await?;

    let new_report = build_report(&message, &transcription, extraction, embedding);
    let id = queries::insert_report(db.as_ref(), &new_report).await?;
    let report = queries::get_report(db.as_ref(), &id)
        .await?
        .ok_or_else(|| emergency_line_database::DbError::NotFound { id: id.clone() })?;

    log::info!(
        "Report {id} created: {} / {} in {}",
        report.emergency_type,
        report.severity,
        report.municipality.as_deref().unwrap_or("?")
    );

    spawn_alert_distribution(db, whatsapp, id);

    Ok(report)
}

/// Runs the extractor and validates its output against the fixed schema.
///
/// A failed call or unusable output degrades to an empty extraction rather
/// than aborting the run — the report is persisted flagged for review, never
/// dropped over an extractor hiccup.
pub async fn run_extraction(ai: &dyn AiProvider, transcript: &str) -> ExtractionOutcome {
    match ai.extract_emergency(transcript).await {
        Ok(value) => parse_extraction(&value),
        Err(e) => {
            log::warn!("Extraction failed, persisting degraded report: {e}");
            parse_extraction(&serde_json::Value::Null)
        }
    }
}

/// Assembles the atomic insert payload from the stage outputs.
#[must_use]
pub fn build_report(
    message: &InboundVoiceMessage,
    transcription: &Transcription,
    extraction: ExtractionOutcome,
    embedding: Vec<f32>,
) -> NewReport {
    let extraction_complete = extraction.is_complete();
    if !extraction_complete {
        log::warn!(
            "Extraction incomplete (missing: {}); flagging report for review",
            extraction.missing.join(", ")
        );
    }

    let record = extraction.record;

    NewReport {
        reporter_phone: message.sender.clone(),
        audio_ref: message.media_id.clone(),
        transcription: transcription.text.clone(),
        transcription_confidence: transcription.confidence,
        emergency_type: record.emergency_type,
        subtype: record.subtype,
        location_text: record.location_text,
        coordinates: record.coordinates,
        municipality: record.municipality,
        severity: record.severity,
        affected_infrastructure: record.affected_infrastructure,
        estimated_impact: record.estimated_impact,
        immediate_actions: record.immediate_actions,
        extraction_complete,
        embedding,
        received_at: message.received_at,
    }
}

/// Hands the new report to alert distribution on a detached task.
///
/// Isolation is structural: the task owns its own handles and the pipeline
/// returns without awaiting it, so a distribution failure cannot reach the
/// webhook response.
fn spawn_alert_distribution(db: Arc<dyn Database>, whatsapp: Arc<WhatsAppClient>, report_id: String) {
    tokio::spawn(async move {
        match emergency_line_alerts::distribute_alerts(
            db.as_ref(),
            Some(whatsapp.as_ref()),
            &report_id,
        )
        .await
        {
            Ok(count) => log::info!("Distributed {count} alerts for report {report_id}"),
            Err(e) => log::error!("Alert distribution failed for report {report_id}: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use emergency_line_ai::AiError;
    use emergency_line_report_models::{EMBEDDING_DIM, EmergencyType, Severity};

    struct FakeExtractor {
        response: Result<serde_json::Value, &'static str>,
    }

    #[async_trait::async_trait]
    impl AiProvider for FakeExtractor {
        async fn transcribe(
            &self,
            _audio: &[u8],
        ) -> Result<emergency_line_ai::Transcription, AiError> {
            unimplemented!("not exercised")
        }

        async fn extract_emergency(
            &self,
            _transcript: &str,
        ) -> Result<serde_json::Value, AiError> {
            self.response
                .clone()
                .map_err(|message| AiError::Provider {
                    message: message.to_string(),
                })
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, AiError> {
            unimplemented!("not exercised")
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String, AiError> {
            unimplemented!("not exercised")
        }
    }

    fn message() -> InboundVoiceMessage {
        InboundVoiceMessage {
            sender: "+573001234567".to_string(),
            media_id: "media-abc".to_string(),
            received_at: Utc::now(),
        }
    }

    fn transcription() -> Transcription {
        Transcription {
            text: "deslizamiento en Bello, en la loma".to_string(),
            confidence: 91.5,
        }
    }

    #[tokio::test]
    async fn successful_extraction_builds_complete_report() {
        let ai = FakeExtractor {
            response: Ok(serde_json::json!({
                "emergencyType": "Deslizamiento",
                "location": "La Loma",
                "municipality": "Bello",
                "severity": "Alta",
            })),
        };

        let extraction = run_extraction(&ai, "deslizamiento en Bello").await;
        let report = build_report(
            &message(),
            &transcription(),
            extraction,
            vec![0.0; EMBEDDING_DIM],
        );

        assert!(report.extraction_complete);
        assert_eq!(report.emergency_type, EmergencyType::Landslide);
        assert_eq!(report.municipality.as_deref(), Some("Bello"));
        assert_eq!(report.severity, Severity::High);
        assert!(!report.transcription.is_empty());
        assert_eq!(report.embedding.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn failed_extraction_degrades_instead_of_dropping() {
        let ai = FakeExtractor {
            response: Err("model unavailable"),
        };

        let extraction = run_extraction(&ai, "deslizamiento en Bello").await;
        assert!(!extraction.is_complete());

        let report = build_report(
            &message(),
            &transcription(),
            extraction,
            vec![0.0; EMBEDDING_DIM],
        );

        // Degraded but persistable: conservative defaults, flagged for review
        assert!(!report.extraction_complete);
        assert_eq!(report.emergency_type, EmergencyType::Other);
        assert_eq!(report.severity, Severity::Medium);
        assert_eq!(report.transcription, transcription().text);
    }

    #[tokio::test]
    async fn incomplete_schema_is_flagged() {
        let ai = FakeExtractor {
            response: Ok(serde_json::json!({
                "emergencyType": "Inundación",
                "severity": "Crítica",
            })),
        };

        let extraction = run_extraction(&ai, "se inundó la quebrada").await;
        let report = build_report(
            &message(),
            &transcription(),
            extraction,
            vec![0.0; EMBEDDING_DIM],
        );

        assert!(!report.extraction_complete);
        // Values the extractor did provide are kept
        assert_eq!(report.emergency_type, EmergencyType::Flood);
        assert_eq!(report.severity, Severity::Critical);
    }
}
