#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Alert distribution.
//!
//! Given a freshly ingested report: compute the eligible recipient set,
//! bulk-create one pending dispatch per recipient, attempt delivery per
//! dispatch with bounded fan-out, and mark each dispatch sent or failed
//! independently. One recipient's failure never blocks or rolls back the
//! others.

use emergency_line_database::queries;
use emergency_line_database_models::{AlertDispatchRow, AlertRecipientRow, ReportRow};
use emergency_line_report_models::{AlertChannel, DispatchState, EmergencyType, Severity};
use emergency_line_whatsapp::WhatsAppClient;
use switchy_database::Database;
use thiserror::Error;

/// Delivery attempts in flight at once. The dispatches share no mutable
/// state beyond their own row, so the cap only bounds provider pressure.
const MAX_CONCURRENT_DELIVERIES: usize = 8;

/// Errors that can occur during alert distribution.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] emergency_line_database::DbError),

    /// The report to distribute alerts for doesn't exist.
    #[error("Report not found: {report_id}")]
    ReportNotFound {
        /// The id that was looked up.
        report_id: String,
    },
}

/// Distributes alerts for one report and returns the number of dispatches
/// created.
///
/// Not idempotent: calling this twice for the same report creates a second
/// round of dispatches. Callers invoke it at most once per report.
///
/// # Errors
///
/// Returns [`AlertError`] if the report can't be loaded or dispatch rows
/// can't be created. Individual delivery failures are recorded on their
/// dispatch row and do not surface here.
pub async fn distribute_alerts(
    db: &dyn Database,
    whatsapp: Option<&WhatsAppClient>,
    report_id: &str,
) -> Result<usize, AlertError> {
    let report = queries::get_report(db, report_id)
        .await?
        .ok_or_else(|| AlertError::ReportNotFound {
            report_id: report_id.to_string(),
        })?;

    let recipients = queries::list_active_recipients(db).await?;
    let eligible = eligible_recipients(recipients, report.severity, report.emergency_type);

    if eligible.is_empty() {
        log::info!(
            "No recipients subscribed to {} / {}; nothing to distribute for report {report_id}",
            report.severity,
            report.emergency_type
        );
        return Ok(0);
    }

    log::info!(
        "Distributing alerts for report {report_id} to {} recipients",
        eligible.len()
    );

    let dispatches = queries::insert_dispatches(db, report_id, &eligible).await?;
    let created = dispatches.len();

    let message = compose_alert_message(&report);

    // Fire concurrent delivery attempts via buffered stream
    use futures::stream::{self, StreamExt as _};
    stream::iter(dispatches.into_iter().zip(eligible).map(
        |(dispatch, recipient)| deliver_and_record(db, whatsapp, dispatch, recipient, &message),
    ))
    .buffer_unordered(MAX_CONCURRENT_DELIVERIES)
    .collect::<Vec<_>>()
    .await;

    Ok(created)
}

/// Attempts one delivery and records the outcome on the dispatch row.
///
/// Every failure path ends in a state update, never an early return — the
/// isolation contract lives here.
async fn deliver_and_record(
    db: &dyn Database,
    whatsapp: Option<&WhatsAppClient>,
    dispatch: AlertDispatchRow,
    recipient: AlertRecipientRow,
    message: &str,
) {
    let state = match deliver(whatsapp, &recipient, message).await {
        Ok(()) => DispatchState::Sent,
        Err(e) => {
            log::error!(
                "Alert delivery to {} ({}) failed: {e}",
                recipient.name,
                recipient.email
            );
            DispatchState::Failed
        }
    };

    if let Err(e) = queries::update_dispatch_state(db, &dispatch.id, state).await {
        log::error!("Failed to record dispatch {} state: {e}", dispatch.id);
    }
}

/// Delivers one alert over the recipient's channel.
async fn deliver(
    whatsapp: Option<&WhatsAppClient>,
    recipient: &AlertRecipientRow,
    message: &str,
) -> Result<(), DeliveryError> {
    match recipient.channel {
        AlertChannel::Whatsapp => {
            let client = whatsapp.ok_or(DeliveryError::ChannelUnavailable)?;
            let phone = recipient
                .phone
                .as_deref()
                .ok_or(DeliveryError::NoPhoneNumber)?;
            client.send_text_message(phone, message).await?;
            Ok(())
        }
        AlertChannel::Email => {
            // TODO: wire a real mail transport; email delivery currently
            // stops at the audit log.
            log::info!("Alert email to {}: {message}", recipient.email);
            Ok(())
        }
    }
}

#[derive(Debug, Error)]
enum DeliveryError {
    #[error("WhatsApp error: {0}")]
    WhatsApp(#[from] emergency_line_whatsapp::WhatsAppError),

    #[error("No messaging client configured for this channel")]
    ChannelUnavailable,

    #[error("Recipient has no phone number")]
    NoPhoneNumber,
}

/// Applies the eligibility rule: active AND (severity OR type subscribed).
#[must_use]
pub fn eligible_recipients(
    recipients: Vec<AlertRecipientRow>,
    severity: Severity,
    emergency_type: EmergencyType,
) -> Vec<AlertRecipientRow> {
    recipients
        .into_iter()
        .filter(|r| r.matches(severity, emergency_type))
        .collect()
}

/// Composes the notification body sent to every eligible recipient.
#[must_use]
pub fn compose_alert_message(report: &ReportRow) -> String {
    use std::fmt::Write as _;

    let mut message = format!("ALERTA {} / {}\n", report.severity, report.emergency_type);

    if let Some(location) = &report.location_text {
        writeln!(message, "Ubicación: {location}").unwrap();
    }
    if let Some(municipality) = &report.municipality {
        writeln!(message, "Comuna/corregimiento: {municipality}").unwrap();
    }
    if let Some(impact) = &report.estimated_impact {
        writeln!(message, "Impacto estimado: {impact}").unwrap();
    }

    write!(
        message,
        "Recibido: {}\nReporte: {}",
        report.received_at.format("%Y-%m-%d %H:%M UTC"),
        report.id
    )
    .unwrap();

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emergency_line_report_models::ReportStatus;

    fn recipient(
        id: &str,
        active: bool,
        severities: &[Severity],
        types: &[EmergencyType],
    ) -> AlertRecipientRow {
        AlertRecipientRow {
            id: id.to_string(),
            name: format!("Recipient {id}"),
            email: format!("{id}@example.org"),
            phone: None,
            active,
            severities: severities.to_vec(),
            emergency_types: types.to_vec(),
            channel: AlertChannel::Email,
        }
    }

    fn report(severity: Severity, emergency_type: EmergencyType) -> ReportRow {
        ReportRow {
            id: "rep-1".to_string(),
            reporter_phone: "+573001234567".to_string(),
            audio_ref: "media-abc".to_string(),
            transcription: "deslizamiento en Bello".to_string(),
            transcription_confidence: 90.0,
            emergency_type,
            subtype: None,
            location_text: Some("La Loma".to_string()),
            coordinates: None,
            municipality: Some("Bello".to_string()),
            severity,
            affected_infrastructure: vec![],
            estimated_impact: Some("Vía bloqueada".to_string()),
            immediate_actions: vec![],
            status: ReportStatus::Pending,
            extraction_complete: true,
            received_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn all_matching_active_recipients_are_eligible() {
        let recipients = vec![
            recipient("a", true, &[Severity::High], &[]),
            recipient("b", true, &[Severity::High], &[]),
            recipient("c", true, &[Severity::Low], &[]),
            recipient("d", false, &[Severity::High], &[]),
        ];

        let eligible = eligible_recipients(recipients, Severity::High, EmergencyType::Flood);

        let ids: Vec<&str> = eligible.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn type_subscription_matches_regardless_of_severity() {
        let recipients = vec![recipient("a", true, &[], &[EmergencyType::Landslide])];

        let eligible =
            eligible_recipients(recipients, Severity::Low, EmergencyType::Landslide);
        assert_eq!(eligible.len(), 1);
    }

    #[test]
    fn no_subscriptions_means_no_dispatches() {
        let recipients = vec![
            recipient("a", true, &[Severity::Critical], &[EmergencyType::Crack]),
        ];

        let eligible = eligible_recipients(recipients, Severity::Low, EmergencyType::Flood);
        assert!(eligible.is_empty());
    }

    #[test]
    fn alert_message_carries_the_key_facts() {
        let message = compose_alert_message(&report(Severity::High, EmergencyType::Landslide));

        assert!(message.contains("HIGH"));
        assert!(message.contains("LANDSLIDE"));
        assert!(message.contains("La Loma"));
        assert!(message.contains("Bello"));
        assert!(message.contains("rep-1"));
    }
}
