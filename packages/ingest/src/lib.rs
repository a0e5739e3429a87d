#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Voice-message ingestion pipeline.
//!
//! Turns one inbound WhatsApp voice message into a persisted emergency
//! report: fetch audio -> transcribe -> extract -> embed -> insert, then
//! hand the new report to alert distribution on a background task. The
//! stages run strictly in order (each consumes the previous stage's
//! output); concurrent messages are independent rows and need no mutual
//! exclusion.

pub mod pipeline;

use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// An incomplete extraction is *not* among them — it degrades the report
/// instead (see [`pipeline::run_extraction`]).
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetching the audio from the messaging provider failed.
    #[error("WhatsApp error: {0}")]
    WhatsApp(#[from] emergency_line_whatsapp::WhatsAppError),

    /// Transcription or embedding failed.
    #[error("AI provider error: {0}")]
    Ai(#[from] emergency_line_ai::AiError),

    /// The store write failed; nothing was persisted.
    #[error("Database error: {0}")]
    Database(#[from] emergency_line_database::DbError),

    /// The audio transcribed to nothing usable.
    #[error("Transcription produced an empty transcript")]
    EmptyTranscript,
}
