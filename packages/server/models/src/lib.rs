#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the emergency-line server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use emergency_line_database_models::{
    Coordinates, HistoricalRecordRow, InterventionRow, ReportRow, ScoredReport,
};
use emergency_line_report_models::{
    EmergencyType, InterventionStatus, ReportStatus, Severity,
};
use serde::{Deserialize, Serialize};

/// An emergency report as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    /// Unique report ID.
    pub id: String,
    /// Reporter phone number.
    pub reporter_phone: String,
    /// Provider media id of the original audio.
    pub audio_ref: String,
    /// Voice message transcript.
    pub transcription: String,
    /// Transcription confidence (0-100).
    pub transcription_confidence: f64,
    /// Canonical emergency type.
    pub emergency_type: EmergencyType,
    /// Free-text subtype.
    pub subtype: Option<String>,
    /// Location as described by the reporter.
    pub location: Option<String>,
    /// Geocoordinates, when known.
    pub coordinates: Option<Coordinates>,
    /// Comuna or corregimiento.
    pub municipality: Option<String>,
    /// Severity level name.
    pub severity: Severity,
    /// Severity numeric value (1-4).
    pub severity_value: u8,
    /// Affected infrastructure elements.
    pub affected_infrastructure: Vec<String>,
    /// Free-text impact estimate.
    pub estimated_impact: Option<String>,
    /// Recommended immediate actions.
    pub immediate_actions: Vec<String>,
    /// Lifecycle state.
    pub status: ReportStatus,
    /// Whether the extractor filled every required field.
    pub extraction_complete: bool,
    /// When the voice message was received (ISO 8601).
    pub received_at: DateTime<Utc>,
    /// Last modification timestamp (ISO 8601).
    pub updated_at: DateTime<Utc>,
}

impl From<ReportRow> for ApiReport {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            reporter_phone: row.reporter_phone,
            audio_ref: row.audio_ref,
            transcription: row.transcription,
            transcription_confidence: row.transcription_confidence,
            emergency_type: row.emergency_type,
            subtype: row.subtype,
            location: row.location_text,
            coordinates: row.coordinates,
            municipality: row.municipality,
            severity: row.severity,
            severity_value: row.severity.value(),
            affected_infrastructure: row.affected_infrastructure,
            estimated_impact: row.estimated_impact,
            immediate_actions: row.immediate_actions,
            status: row.status,
            extraction_complete: row.extraction_complete,
            received_at: row.received_at,
            updated_at: row.updated_at,
        }
    }
}

/// A retrieved report with its similarity score, cited by the query
/// endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRelatedReport {
    /// The report.
    #[serde(flatten)]
    pub report: ApiReport,
    /// Cosine similarity to the question, in `[0, 1]`.
    pub similarity: f64,
}

impl From<ScoredReport> for ApiRelatedReport {
    fn from(scored: ScoredReport) -> Self {
        Self {
            report: scored.report.into(),
            similarity: scored.similarity,
        }
    }
}

/// Query parameters for the reports list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQueryParams {
    /// Filter by lifecycle state name.
    pub status: Option<String>,
    /// Filter by severity name.
    pub severity: Option<String>,
    /// Filter by emergency type name.
    #[serde(rename = "type")]
    pub emergency_type: Option<String>,
    /// Filter by comuna/corregimiento.
    pub municipality: Option<String>,
    /// Minimum reception date (ISO 8601).
    pub from: Option<DateTime<Utc>>,
    /// Maximum reception date (ISO 8601).
    pub to: Option<DateTime<Utc>>,
    /// Free-text search over transcript and location.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
}

/// Pagination envelope for list responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPagination {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total rows matching the filters.
    pub total: u64,
    /// Total pages at this page size.
    pub total_pages: u64,
}

/// Response from the reports list endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListResponse {
    /// One page of reports, newest first.
    pub data: Vec<ApiReport>,
    /// Pagination info.
    pub pagination: ApiPagination,
}

/// An intervention as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIntervention {
    /// Unique intervention ID.
    pub id: String,
    /// Parent report ID.
    pub report_id: String,
    /// Assigned personnel reference.
    pub personnel_id: String,
    /// Description of the work.
    pub description: String,
    /// Lifecycle state.
    pub status: InterventionStatus,
    /// When personnel were assigned.
    pub assigned_at: DateTime<Utc>,
    /// When the work finished, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Field notes.
    pub notes: Option<String>,
}

impl From<InterventionRow> for ApiIntervention {
    fn from(row: InterventionRow) -> Self {
        Self {
            id: row.id,
            report_id: row.report_id,
            personnel_id: row.personnel_id,
            description: row.description,
            status: row.status,
            assigned_at: row.assigned_at,
            completed_at: row.completed_at,
            notes: row.notes,
        }
    }
}

/// Response from the report detail endpoint: the report plus its
/// interventions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReportDetail {
    /// The report.
    #[serde(flatten)]
    pub report: ApiReport,
    /// Interventions for this report, oldest first.
    pub interventions: Vec<ApiIntervention>,
}

/// Body of the report status update endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    /// The new lifecycle state.
    pub status: ReportStatus,
}

/// Body of the intervention creation endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInterventionRequest {
    /// Parent report ID.
    pub report_id: String,
    /// Assigned personnel reference.
    pub personnel_id: String,
    /// Description of the work.
    pub description: String,
}

/// Body of the intervention update endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInterventionRequest {
    /// New lifecycle state, if changing.
    pub status: Option<InterventionStatus>,
    /// Field notes, if adding.
    pub notes: Option<String>,
}

/// Body of the RAG query endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// The natural-language question. Required.
    pub query: Option<String>,
}

/// Response from the RAG query endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The grounded answer.
    pub answer: String,
    /// The retrieved reports backing the answer. The UI must only cite
    /// reports from this list.
    pub related_reports: Vec<ApiRelatedReport>,
    /// Ids of the retrieved reports.
    pub sources: Vec<String>,
}

/// Body of the alert distribution endpoint. The field name follows the
/// established integration contract.
#[derive(Debug, Clone, Deserialize)]
pub struct DistributeRequest {
    /// The report to distribute alerts for.
    #[serde(rename = "reporteId")]
    pub reporte_id: String,
}

/// Response from the alert distribution endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeResponse {
    /// Whether distribution ran to completion.
    pub success: bool,
    /// Number of dispatches created.
    pub alerts_sent: usize,
}

/// Acknowledgement returned by the webhook endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    /// Status token: `no_messages`, `ignored_non_audio`, or `success`.
    pub status: &'static str,
    /// Created report id, present on `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

impl WebhookAck {
    /// The envelope carried no messages (or didn't parse as one).
    #[must_use]
    pub const fn no_messages() -> Self {
        Self {
            status: "no_messages",
            report_id: None,
        }
    }

    /// The message wasn't a voice note; nothing was ingested.
    #[must_use]
    pub const fn ignored_non_audio() -> Self {
        Self {
            status: "ignored_non_audio",
            report_id: None,
        }
    }

    /// A report was created.
    #[must_use]
    pub const fn success(report_id: String) -> Self {
        Self {
            status: "success",
            report_id: Some(report_id),
        }
    }
}

/// Query parameters for the webhook verification handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookVerifyParams {
    /// `hub.mode`, expected to be `subscribe`.
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    /// `hub.verify_token`, matched against the configured token.
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    /// `hub.challenge`, echoed back on success.
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// A historical record as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHistoricalRecord {
    /// Unique record ID.
    pub id: String,
    /// Street address.
    pub address: String,
    /// Neighborhood, when known.
    pub neighborhood: Option<String>,
    /// Geocoordinates, when known.
    pub coordinates: Option<Coordinates>,
    /// Priority level (1-4).
    pub priority: u8,
    /// Free-form notes.
    pub notes: Option<String>,
    /// When the record was captured.
    pub recorded_at: DateTime<Utc>,
}

impl From<HistoricalRecordRow> for ApiHistoricalRecord {
    fn from(row: HistoricalRecordRow) -> Self {
        Self {
            id: row.id,
            address: row.address,
            neighborhood: row.neighborhood,
            coordinates: row.coordinates,
            priority: row.priority,
            notes: row.notes,
            recorded_at: row.recorded_at,
        }
    }
}

/// Query parameters for the historical records endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalQueryParams {
    /// Filter by neighborhood.
    pub neighborhood: Option<String>,
    /// Minimum priority (1-4).
    pub priority_min: Option<u8>,
    /// Free-text search over address and notes.
    pub search: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Short error payload returned by every endpoint on failure. Never
/// carries internals beyond the provided detail string.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Short error description.
    pub error: String,
    /// Optional detail string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Builds an error payload without details.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// Builds an error payload with a detail string.
    #[must_use]
    pub fn with_details(error: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self {
            error: error.into(),
            details: Some(details.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_ack_serializes_status_tokens() {
        let ack = serde_json::to_value(WebhookAck::ignored_non_audio()).unwrap();
        assert_eq!(ack["status"], "ignored_non_audio");
        assert!(ack.get("reportId").is_none());

        let ack = serde_json::to_value(WebhookAck::success("rep-1".to_string())).unwrap();
        assert_eq!(ack["status"], "success");
        assert_eq!(ack["reportId"], "rep-1");
    }

    #[test]
    fn distribute_request_uses_contract_field_name() {
        let req: DistributeRequest =
            serde_json::from_str(r#"{"reporteId":"rep-9"}"#).unwrap();
        assert_eq!(req.reporte_id, "rep-9");
    }

    #[test]
    fn verify_params_accept_dotted_keys() {
        let params: WebhookVerifyParams = serde_json::from_str(
            r#"{"hub.mode":"subscribe","hub.verify_token":"secreto","hub.challenge":"42"}"#,
        )
        .unwrap();
        assert_eq!(params.mode.as_deref(), Some("subscribe"));
        assert_eq!(params.challenge.as_deref(), Some("42"));
    }
}
