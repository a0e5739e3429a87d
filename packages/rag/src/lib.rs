#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Retrieval-augmented query engine.
//!
//! Answers natural-language questions over the report store: embed the
//! question in the same space as the reports, retrieve the top-K matches
//! above a similarity threshold, and run a completion constrained to that
//! context. Every query is recorded with its answer and cited report ids.

use emergency_line_ai::AiProvider;
use emergency_line_database::queries;
use emergency_line_database_models::ScoredReport;
use switchy_database::Database;
use thiserror::Error;

/// How many reports to retrieve per question.
pub const DEFAULT_TOP_K: u32 = 5;

/// Minimum cosine similarity for a report to enter the context. Reports
/// below the threshold are excluded, never padded back in.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Maximum transcript excerpt length (in characters) per context block.
const TRANSCRIPT_EXCERPT_CHARS: usize = 300;

/// System instruction for the answering model. Constrains it to the
/// supplied context and the operating language.
const ANSWER_SYSTEM_PROMPT: &str = "Eres un analista de datos de emergencias de \
infraestructura en Medellín.\n\n\
INSTRUCCIONES:\n\
- Responde en español de forma clara y profesional\n\
- Usa ÚNICAMENTE los reportes históricos proporcionados como fuente\n\
- Menciona estadísticas específicas (cantidades, fechas, ubicaciones)\n\
- Identifica patrones y tendencias cuando sea relevante\n\
- Si el contexto no contiene información suficiente, dilo explícitamente\n\
- Usa términos locales de Medellín (comunas, corregimientos, barrios)";

/// Context line used when retrieval finds nothing above the threshold.
const NO_REPORTS_CONTEXT: &str = "No se encontraron reportes relevantes en la base de datos.";

/// Errors that can occur answering a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Embedding or completion failed.
    #[error("AI provider error: {0}")]
    Ai(#[from] emergency_line_ai::AiError),

    /// Similarity search failed.
    #[error("Database error: {0}")]
    Database(#[from] emergency_line_database::DbError),
}

/// A grounded answer plus the reports that ground it.
#[derive(Debug)]
pub struct QueryOutcome {
    /// The answer text.
    pub answer: String,
    /// The retrieved reports, best match first. The UI must only cite
    /// reports from this list.
    pub related_reports: Vec<ScoredReport>,
    /// Ids of the retrieved reports — always exactly the ids in
    /// `related_reports`, so the engine can never invent a source.
    pub sources: Vec<String>,
}

/// Answers one natural-language question.
///
/// The question is embedded with the same model as the stored reports —
/// a cross-model mismatch wouldn't error, it would silently rank garbage,
/// which is why the embedding call goes through the same provider the
/// pipeline uses. An empty retrieval set still produces an answer that
/// acknowledges the missing data.
///
/// # Errors
///
/// Returns [`QueryError`] if embedding, retrieval, or the completion fails.
/// A failure to record the query history is logged, not surfaced — the
/// answer is already in hand.
pub async fn answer_query(
    db: &dyn Database,
    ai: &dyn AiProvider,
    question: &str,
) -> Result<QueryOutcome, QueryError> {
    log::info!("RAG query received: {question}");

    let embedding = ai.embed(question).await?;

    let related_reports = queries::search_similar_reports(
        db,
        &embedding,
        DEFAULT_TOP_K,
        DEFAULT_SIMILARITY_THRESHOLD,
    )
    .await?;

    log::info!("Found {} similar reports", related_reports.len());

    let context = compose_context(&related_reports);
    let answer = ai
        .complete(ANSWER_SYSTEM_PROMPT, &build_user_prompt(question, &context))
        .await?;

    let sources: Vec<String> = related_reports.iter().map(|s| s.report.id.clone()).collect();

    if let Err(e) = queries::insert_query_record(db, question, &answer, &sources, &embedding).await
    {
        log::error!("Failed to record query history: {e}");
    }

    Ok(QueryOutcome {
        answer,
        related_reports,
        sources,
    })
}

/// Formats the retrieved reports into the grounding context.
///
/// One numbered block per report: id, date, type, location, severity, and
/// a transcript excerpt. An empty retrieval set becomes an explicit
/// no-data statement so the model acknowledges it instead of guessing.
#[must_use]
pub fn compose_context(reports: &[ScoredReport]) -> String {
    if reports.is_empty() {
        return NO_REPORTS_CONTEXT.to_string();
    }

    reports
        .iter()
        .enumerate()
        .map(|(idx, scored)| {
            let report = &scored.report;
            format!(
                "[Reporte {n}]\n\
                 ID: {id}\n\
                 Fecha: {date}\n\
                 Tipo: {emergency_type}\n\
                 Ubicación: {location}\n\
                 Severidad: {severity}\n\
                 Transcripción: {excerpt}\n\
                 ---",
                n = idx + 1,
                id = report.id,
                date = report.received_at.format("%Y-%m-%d %H:%M"),
                emergency_type = report.emergency_type,
                location = report.location_text.as_deref().unwrap_or("desconocida"),
                severity = report.severity,
                excerpt = excerpt(&report.transcription, TRANSCRIPT_EXCERPT_CHARS),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the user turn for the answering model.
fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Pregunta del usuario: {question}\n\n\
         Reportes históricos relevantes encontrados:\n{context}\n\n\
         Por favor, responde la pregunta basándote en estos reportes históricos."
    )
}

/// Truncates a transcript on a character boundary.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emergency_line_database_models::ReportRow;
    use emergency_line_report_models::{EmergencyType, ReportStatus, Severity};

    fn scored(id: &str, transcription: &str, similarity: f64) -> ScoredReport {
        ScoredReport {
            report: ReportRow {
                id: id.to_string(),
                reporter_phone: "+573001234567".to_string(),
                audio_ref: "media-abc".to_string(),
                transcription: transcription.to_string(),
                transcription_confidence: 88.0,
                emergency_type: EmergencyType::Landslide,
                subtype: None,
                location_text: Some("La Loma, Bello".to_string()),
                coordinates: None,
                municipality: Some("Bello".to_string()),
                severity: Severity::High,
                affected_infrastructure: vec![],
                estimated_impact: None,
                immediate_actions: vec![],
                status: ReportStatus::Pending,
                extraction_complete: true,
                received_at: Utc::now(),
                updated_at: Utc::now(),
            },
            similarity,
        }
    }

    #[test]
    fn empty_retrieval_states_no_data() {
        let context = compose_context(&[]);
        assert_eq!(context, NO_REPORTS_CONTEXT);
    }

    #[test]
    fn context_carries_id_type_and_excerpt() {
        let reports = vec![
            scored("rep-1", "deslizamiento en la loma", 0.93),
            scored("rep-2", "otro deslizamiento", 0.81),
        ];

        let context = compose_context(&reports);

        assert!(context.contains("[Reporte 1]"));
        assert!(context.contains("[Reporte 2]"));
        assert!(context.contains("ID: rep-1"));
        assert!(context.contains("LANDSLIDE"));
        assert!(context.contains("La Loma, Bello"));
        assert!(context.contains("deslizamiento en la loma"));
    }

    #[test]
    fn long_transcripts_are_excerpted() {
        let long = "palabra ".repeat(100);
        let reports = vec![scored("rep-1", &long, 0.9)];

        let context = compose_context(&reports);

        assert!(context.contains("..."));
        assert!(!context.contains(&long));
    }

    #[test]
    fn excerpt_respects_multibyte_boundaries() {
        let text = "ñ".repeat(400);
        let cut = excerpt(&text, 300);
        assert_eq!(cut.chars().count(), 303);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn user_prompt_embeds_question_and_context() {
        let prompt = build_user_prompt("¿Cuántos deslizamientos hubo en Bello?", "contexto");
        assert!(prompt.contains("¿Cuántos deslizamientos hubo en Bello?"));
        assert!(prompt.contains("contexto"));
    }
}
