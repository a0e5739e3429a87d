#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `Postgres` store. They are distinct from the API response types in
//! `emergency_line_server_models`, which evolve with the HTTP contract.

use chrono::{DateTime, Utc};
pub use emergency_line_report_models::Coordinates;
use emergency_line_report_models::{
    AlertChannel, DispatchState, EmergencyType, InterventionStatus, ReportStatus, Severity,
};
use serde::{Deserialize, Serialize};

/// An emergency report row as retrieved from the database.
///
/// The embedding vector is intentionally absent — it is written once at
/// ingestion and only ever consumed inside the store's similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Primary key (UUID).
    pub id: String,
    /// Phone number the voice message came from.
    pub reporter_phone: String,
    /// Messaging-provider media id of the original audio.
    pub audio_ref: String,
    /// Full transcript of the voice message.
    pub transcription: String,
    /// Transcription confidence, 0-100.
    pub transcription_confidence: f64,
    /// Canonical emergency type.
    pub emergency_type: EmergencyType,
    /// Free-text subtype from the extractor.
    pub subtype: Option<String>,
    /// Location as described by the reporter.
    pub location_text: Option<String>,
    /// Geocoordinates, when the extractor could determine them.
    pub coordinates: Option<Coordinates>,
    /// Comuna or corregimiento.
    pub municipality: Option<String>,
    /// Severity assigned by the extractor.
    pub severity: Severity,
    /// Affected infrastructure elements.
    pub affected_infrastructure: Vec<String>,
    /// Free-text impact estimate.
    pub estimated_impact: Option<String>,
    /// Immediate actions recommended by the extractor.
    pub immediate_actions: Vec<String>,
    /// Lifecycle state.
    pub status: ReportStatus,
    /// `false` when the extractor failed to fill every required field and
    /// the report was persisted in degraded form.
    pub extraction_complete: bool,
    /// When the voice message was received. Set once, immutable.
    pub received_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// All fields required to insert a new report in one atomic write.
///
/// Carries the embedding — the insert is the durability boundary, so a
/// report is never visible without it.
#[derive(Debug, Clone)]
pub struct NewReport {
    /// Phone number the voice message came from.
    pub reporter_phone: String,
    /// Messaging-provider media id of the original audio.
    pub audio_ref: String,
    /// Full transcript of the voice message.
    pub transcription: String,
    /// Transcription confidence, 0-100.
    pub transcription_confidence: f64,
    /// Canonical emergency type.
    pub emergency_type: EmergencyType,
    /// Free-text subtype from the extractor.
    pub subtype: Option<String>,
    /// Location as described by the reporter.
    pub location_text: Option<String>,
    /// Geocoordinates, when the extractor could determine them.
    pub coordinates: Option<Coordinates>,
    /// Comuna or corregimiento.
    pub municipality: Option<String>,
    /// Severity assigned by the extractor.
    pub severity: Severity,
    /// Affected infrastructure elements.
    pub affected_infrastructure: Vec<String>,
    /// Free-text impact estimate.
    pub estimated_impact: Option<String>,
    /// Immediate actions recommended by the extractor.
    pub immediate_actions: Vec<String>,
    /// Whether the extractor filled every required field.
    pub extraction_complete: bool,
    /// Embedding of the raw transcript.
    pub embedding: Vec<f32>,
    /// When the voice message was received.
    pub received_at: DateTime<Utc>,
}

/// A report row paired with its similarity score from a vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredReport {
    /// The matched report.
    pub report: ReportRow,
    /// Cosine similarity to the query vector, in `[0, 1]`.
    pub similarity: f64,
}

/// Parameters for querying reports from the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    /// Filter by lifecycle state.
    pub status: Option<ReportStatus>,
    /// Filter by severity.
    pub severity: Option<Severity>,
    /// Filter by emergency type.
    pub emergency_type: Option<EmergencyType>,
    /// Filter by comuna/corregimiento (exact match).
    pub municipality: Option<String>,
    /// Minimum reception date.
    pub from: Option<DateTime<Utc>>,
    /// Maximum reception date.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring match against transcription and location.
    pub search: Option<String>,
    /// Maximum number of results to return.
    pub limit: u32,
    /// Number of results to skip.
    pub offset: u32,
}

/// One page of report results plus the total count for pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPage {
    /// The rows in this page, newest first.
    pub rows: Vec<ReportRow>,
    /// Total rows matching the filters, ignoring pagination.
    pub total: u64,
}

/// An intervention row as retrieved from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRow {
    /// Primary key (UUID).
    pub id: String,
    /// The report this intervention belongs to.
    pub report_id: String,
    /// Assigned field-personnel reference.
    pub personnel_id: String,
    /// What the intervention is supposed to do.
    pub description: String,
    /// Lifecycle state.
    pub status: InterventionStatus,
    /// When personnel were assigned.
    pub assigned_at: DateTime<Utc>,
    /// When the work finished, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form field notes.
    pub notes: Option<String>,
}

/// Fields for creating a new intervention.
#[derive(Debug, Clone)]
pub struct NewIntervention {
    /// The report this intervention belongs to.
    pub report_id: String,
    /// Assigned field-personnel reference.
    pub personnel_id: String,
    /// What the intervention is supposed to do.
    pub description: String,
}

/// An alert recipient row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecipientRow {
    /// Primary key (UUID).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address alerts are delivered to.
    pub email: String,
    /// Phone number for WhatsApp-channel delivery.
    pub phone: Option<String>,
    /// Inactive recipients never receive dispatches.
    pub active: bool,
    /// Severities this recipient subscribed to.
    pub severities: Vec<Severity>,
    /// Emergency types this recipient subscribed to.
    pub emergency_types: Vec<EmergencyType>,
    /// Preferred contact channel.
    pub channel: AlertChannel,
}

impl AlertRecipientRow {
    /// Whether this recipient should be alerted for a report with the given
    /// severity and type: active AND (severity subscribed OR type subscribed).
    #[must_use]
    pub fn matches(&self, severity: Severity, emergency_type: EmergencyType) -> bool {
        self.active
            && (self.severities.contains(&severity)
                || self.emergency_types.contains(&emergency_type))
    }
}

/// An alert dispatch row: one delivery attempt for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDispatchRow {
    /// Primary key (UUID).
    pub id: String,
    /// The report that triggered this dispatch.
    pub report_id: String,
    /// The recipient this dispatch targets.
    pub recipient_id: String,
    /// Channel the delivery goes out on.
    pub channel: AlertChannel,
    /// Delivery state.
    pub state: DispatchState,
    /// When the dispatch was created.
    pub dispatched_at: DateTime<Utc>,
}

/// A historical record row, from the pre-existing bulk-imported dataset.
///
/// Distinct from [`ReportRow`] — these records predate the voice-message
/// pipeline and have no transcription or embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecordRow {
    /// Primary key (UUID).
    pub id: String,
    /// Street address.
    pub address: String,
    /// Neighborhood, when known.
    pub neighborhood: Option<String>,
    /// Geocoordinates, when known.
    pub coordinates: Option<Coordinates>,
    /// Priority level from the original dataset, 1 (low) to 4 (critical).
    pub priority: u8,
    /// Free-form notes.
    pub notes: Option<String>,
    /// When the record was captured in the original dataset.
    pub recorded_at: DateTime<Utc>,
}

/// Parameters for listing historical records.
#[derive(Debug, Clone, Default)]
pub struct HistoricalQuery {
    /// Filter by neighborhood (exact match).
    pub neighborhood: Option<String>,
    /// Minimum priority.
    pub priority_min: Option<u8>,
    /// Case-insensitive substring match against address and notes.
    pub search: Option<String>,
    /// Maximum number of results to return.
    pub limit: u32,
    /// Number of results to skip.
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(active: bool, severities: &[Severity], types: &[EmergencyType]) -> AlertRecipientRow {
        AlertRecipientRow {
            id: "r1".to_string(),
            name: "Sala de Crisis".to_string(),
            email: "crisis@example.org".to_string(),
            phone: None,
            active,
            severities: severities.to_vec(),
            emergency_types: types.to_vec(),
            channel: AlertChannel::Email,
        }
    }

    #[test]
    fn recipient_matches_on_severity() {
        let r = recipient(true, &[Severity::High], &[]);
        assert!(r.matches(Severity::High, EmergencyType::Flood));
        assert!(!r.matches(Severity::Low, EmergencyType::Flood));
    }

    #[test]
    fn recipient_matches_on_type() {
        let r = recipient(true, &[], &[EmergencyType::Landslide]);
        assert!(r.matches(Severity::Low, EmergencyType::Landslide));
        assert!(!r.matches(Severity::Low, EmergencyType::Crack));
    }

    #[test]
    fn severity_or_type_is_a_union() {
        let r = recipient(true, &[Severity::Critical], &[EmergencyType::Landslide]);
        assert!(r.matches(Severity::Critical, EmergencyType::Flood));
        assert!(r.matches(Severity::Low, EmergencyType::Landslide));
        assert!(!r.matches(Severity::Low, EmergencyType::Flood));
    }

    #[test]
    fn inactive_recipient_never_matches() {
        let r = recipient(false, &[Severity::Critical], &[EmergencyType::Landslide]);
        assert!(!r.matches(Severity::Critical, EmergencyType::Landslide));
    }
}
