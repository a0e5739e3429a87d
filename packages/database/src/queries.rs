//! Database query functions for emergency reports.
//!
//! Vector similarity queries use `query_raw_params()` with `pgvector`
//! operators. Everything else is parameterized raw SQL over the same
//! `switchy_database` connection.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use emergency_line_database_models::{
    AlertDispatchRow, AlertRecipientRow, Coordinates, HistoricalQuery, HistoricalRecordRow,
    InterventionRow, NewIntervention, NewReport, ReportPage, ReportQuery, ReportRow, ScoredReport,
};
use emergency_line_report_models::{
    AlertChannel, DispatchState, EmergencyType, InterventionStatus, ReportStatus, Severity,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;
use crate::vector::vector_literal;

/// Columns selected for every report read. Excludes the embedding — the
/// vector only ever participates in SQL-side similarity scoring.
const REPORT_COLUMNS: &str = "id, reporter_phone, audio_ref, transcription,
        transcription_confidence, emergency_type, subtype, location_text,
        latitude, longitude, municipality, severity, affected_infrastructure,
        estimated_impact, immediate_actions, status, extraction_complete,
        received_at, updated_at";

/// Inserts a fully processed report in one atomic write.
///
/// The row carries the transcript, extraction fields, and embedding
/// together — a reader can never observe a report without them.
///
/// # Errors
///
/// Returns [`DbError`] if the embedding has the wrong dimensionality or the
/// database operation fails.
pub async fn insert_report(db: &dyn Database, report: &NewReport) -> Result<String, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let embedding = vector_literal(&report.embedding)?;

    let infrastructure = to_json_text(&report.affected_infrastructure)?;
    let actions = to_json_text(&report.immediate_actions)?;

    db.exec_raw_params(
        "INSERT INTO reports (
            id, reporter_phone, audio_ref, transcription,
            transcription_confidence, emergency_type, subtype, location_text,
            latitude, longitude, municipality, severity,
            affected_infrastructure, estimated_impact, immediate_actions,
            status, extraction_complete, embedding, received_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18::vector, $19, $19
        )",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::String(report.reporter_phone.clone()),
            DatabaseValue::String(report.audio_ref.clone()),
            DatabaseValue::String(report.transcription.clone()),
            DatabaseValue::Real64(report.transcription_confidence),
            DatabaseValue::String(report.emergency_type.as_ref().to_string()),
            report
                .subtype
                .as_ref()
                .map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone())),
            report
                .location_text
                .as_ref()
                .map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone())),
            report
                .coordinates
                .map_or(DatabaseValue::Null, |c| DatabaseValue::Real64(c.lat)),
            report
                .coordinates
                .map_or(DatabaseValue::Null, |c| DatabaseValue::Real64(c.lng)),
            report
                .municipality
                .as_ref()
                .map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone())),
            DatabaseValue::String(report.severity.as_ref().to_string()),
            DatabaseValue::String(infrastructure),
            report
                .estimated_impact
                .as_ref()
                .map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone())),
            DatabaseValue::String(actions),
            DatabaseValue::String(ReportStatus::Pending.as_ref().to_string()),
            DatabaseValue::Bool(report.extraction_complete),
            DatabaseValue::String(embedding),
            DatabaseValue::DateTime(report.received_at.naive_utc()),
        ],
    )
    .await?;

    Ok(id)
}

/// Fetches a single report by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_report(db: &dyn Database, id: &str) -> Result<Option<ReportRow>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"),
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    Ok(rows.first().map(report_from_row))
}

/// Queries reports with the dashboard's filter set, newest first.
///
/// Returns one page plus the total count matching the filters.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_reports(db: &dyn Database, query: &ReportQuery) -> Result<ReportPage, DbError> {
    let (filter_sql, mut params) = build_report_filters(query, 1);

    let count_rows = db
        .query_raw_params(
            &format!("SELECT COUNT(*) as total FROM reports WHERE 1=1{filter_sql}"),
            &params,
        )
        .await?;
    let total: i64 = count_rows
        .first()
        .map_or(0, |row| row.to_value("total").unwrap_or(0));

    let mut sql = format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE 1=1{filter_sql} ORDER BY received_at DESC"
    );
    let mut param_idx = params.len() + 1;

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.limit)));
    param_idx += 1;

    write!(sql, " OFFSET ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.offset)));

    let rows = db.query_raw_params(&sql, &params).await?;

    Ok(ReportPage {
        rows: rows.iter().map(report_from_row).collect(),
        total: u64::try_from(total).unwrap_or(0),
    })
}

/// Updates a report's lifecycle state, enforcing the forward-only rule.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the report doesn't exist,
/// [`DbError::InvalidTransition`] if the new state would be a regression,
/// or [`DbError`] if the database operation fails.
pub async fn update_report_status(
    db: &dyn Database,
    id: &str,
    new_status: ReportStatus,
) -> Result<ReportRow, DbError> {
    let current = get_report(db, id).await?.ok_or_else(|| DbError::NotFound {
        id: id.to_string(),
    })?;

    if !current.status.can_transition_to(new_status) {
        return Err(DbError::report_transition(current.status, new_status));
    }

    db.exec_raw_params(
        "UPDATE reports SET status = $2, updated_at = $3 WHERE id = $1",
        &[
            DatabaseValue::String(id.to_string()),
            DatabaseValue::String(new_status.as_ref().to_string()),
            DatabaseValue::DateTime(Utc::now().naive_utc()),
        ],
    )
    .await?;

    get_report(db, id).await?.ok_or_else(|| DbError::NotFound {
        id: id.to_string(),
    })
}

/// Finds the reports most similar to the given embedding.
///
/// Scores with cosine similarity in SQL, excludes rows below `threshold`
/// (never padded back in), and returns at most `k` rows, best match first.
/// Rows without a transcript or embedding can't exist (the insert is
/// atomic) but are guarded against anyway so a partially migrated table
/// never leaks into answers.
///
/// # Errors
///
/// Returns [`DbError`] if the embedding has the wrong dimensionality or the
/// database operation fails.
pub async fn search_similar_reports(
    db: &dyn Database,
    embedding: &[f32],
    k: u32,
    threshold: f64,
) -> Result<Vec<ScoredReport>, DbError> {
    let literal = vector_literal(embedding)?;

    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {REPORT_COLUMNS},
                        1 - (embedding <=> $1::vector) as similarity
                 FROM reports
                 WHERE embedding IS NOT NULL
                   AND transcription <> ''
                   AND 1 - (embedding <=> $1::vector) >= $2
                 ORDER BY embedding <=> $1::vector
                 LIMIT $3"
            ),
            &[
                DatabaseValue::String(literal),
                DatabaseValue::Real64(threshold),
                DatabaseValue::Int64(i64::from(k)),
            ],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| ScoredReport {
            report: report_from_row(row),
            similarity: row.to_value("similarity").unwrap_or(0.0),
        })
        .collect())
}

/// Creates an intervention and bumps the parent report to in-progress.
///
/// The bump only applies to pending reports — a resolved report is never
/// regressed by late field work.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the parent report doesn't exist, or
/// [`DbError`] if the database operation fails.
pub async fn insert_intervention(
    db: &dyn Database,
    intervention: &NewIntervention,
) -> Result<InterventionRow, DbError> {
    if get_report(db, &intervention.report_id).await?.is_none() {
        return Err(DbError::NotFound {
            id: intervention.report_id.clone(),
        });
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    db.exec_raw_params(
        "INSERT INTO interventions (
            id, report_id, personnel_id, description, status, assigned_at
        ) VALUES ($1, $2, $3, $4, $5, $6)",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::String(intervention.report_id.clone()),
            DatabaseValue::String(intervention.personnel_id.clone()),
            DatabaseValue::String(intervention.description.clone()),
            DatabaseValue::String(InterventionStatus::Pending.as_ref().to_string()),
            DatabaseValue::DateTime(now.naive_utc()),
        ],
    )
    .await?;

    db.exec_raw_params(
        "UPDATE reports SET status = $2, updated_at = $3
         WHERE id = $1 AND status = $4",
        &[
            DatabaseValue::String(intervention.report_id.clone()),
            DatabaseValue::String(ReportStatus::InProgress.as_ref().to_string()),
            DatabaseValue::DateTime(now.naive_utc()),
            DatabaseValue::String(ReportStatus::Pending.as_ref().to_string()),
        ],
    )
    .await?;

    Ok(InterventionRow {
        id,
        report_id: intervention.report_id.clone(),
        personnel_id: intervention.personnel_id.clone(),
        description: intervention.description.clone(),
        status: InterventionStatus::Pending,
        assigned_at: now,
        completed_at: None,
        notes: None,
    })
}

/// Updates an intervention's state and/or notes, enforcing the
/// forward-only rule. Sets `completed_at` when the work completes.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the intervention doesn't exist,
/// [`DbError::InvalidTransition`] on a state regression, or [`DbError`] if
/// the database operation fails.
pub async fn update_intervention(
    db: &dyn Database,
    id: &str,
    new_status: Option<InterventionStatus>,
    notes: Option<String>,
) -> Result<InterventionRow, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, report_id, personnel_id, description, status,
                    assigned_at, completed_at, notes
             FROM interventions WHERE id = $1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    let current = rows
        .first()
        .map(intervention_from_row)
        .ok_or_else(|| DbError::NotFound { id: id.to_string() })?;

    let status = match new_status {
        Some(next) => {
            if !current.status.can_transition_to(next) {
                return Err(DbError::intervention_transition(current.status, next));
            }
            next
        }
        None => current.status,
    };

    let completed_at = if status == InterventionStatus::Completed {
        current.completed_at.or_else(|| Some(Utc::now()))
    } else {
        current.completed_at
    };
    let notes = notes.or(current.notes);

    db.exec_raw_params(
        "UPDATE interventions SET status = $2, completed_at = $3, notes = $4
         WHERE id = $1",
        &[
            DatabaseValue::String(id.to_string()),
            DatabaseValue::String(status.as_ref().to_string()),
            completed_at.map_or(DatabaseValue::Null, |dt| {
                DatabaseValue::DateTime(dt.naive_utc())
            }),
            notes
                .as_ref()
                .map_or(DatabaseValue::Null, |n| DatabaseValue::String(n.clone())),
        ],
    )
    .await?;

    Ok(InterventionRow {
        status,
        completed_at,
        notes,
        ..current
    })
}

/// Lists all interventions for a report, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_interventions(
    db: &dyn Database,
    report_id: &str,
) -> Result<Vec<InterventionRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, report_id, personnel_id, description, status,
                    assigned_at, completed_at, notes
             FROM interventions WHERE report_id = $1
             ORDER BY assigned_at",
            &[DatabaseValue::String(report_id.to_string())],
        )
        .await?;

    Ok(rows.iter().map(intervention_from_row).collect())
}

/// Lists all active alert recipients.
///
/// The severity/type eligibility rule is applied in Rust by the caller —
/// the subscription sets live in JSON columns.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_active_recipients(db: &dyn Database) -> Result<Vec<AlertRecipientRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, name, email, phone, active, severities, emergency_types, channel
             FROM alert_recipients WHERE active = $1",
            &[DatabaseValue::Bool(true)],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let severities_json: String = row.to_value("severities").unwrap_or_default();
            let types_json: String = row.to_value("emergency_types").unwrap_or_default();
            let channel_name: String = row.to_value("channel").unwrap_or_default();

            AlertRecipientRow {
                id: row.to_value("id").unwrap_or_default(),
                name: row.to_value("name").unwrap_or_default(),
                email: row.to_value("email").unwrap_or_default(),
                phone: row.to_value("phone").unwrap_or(None),
                active: row.to_value("active").unwrap_or(false),
                severities: from_json_text(&severities_json),
                emergency_types: from_json_text(&types_json),
                channel: channel_name.parse().unwrap_or(AlertChannel::Email),
            }
        })
        .collect())
}

/// Bulk-creates one pending dispatch per recipient for a report.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn insert_dispatches(
    db: &dyn Database,
    report_id: &str,
    recipients: &[AlertRecipientRow],
) -> Result<Vec<AlertDispatchRow>, DbError> {
    let now = Utc::now();
    let mut dispatches = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let id = uuid::Uuid::new_v4().to_string();

        db.exec_raw_params(
            "INSERT INTO alert_dispatches (
                id, report_id, recipient_id, channel, state, dispatched_at
            ) VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                DatabaseValue::String(id.clone()),
                DatabaseValue::String(report_id.to_string()),
                DatabaseValue::String(recipient.id.clone()),
                DatabaseValue::String(recipient.channel.as_ref().to_string()),
                DatabaseValue::String(DispatchState::Pending.as_ref().to_string()),
                DatabaseValue::DateTime(now.naive_utc()),
            ],
        )
        .await?;

        dispatches.push(AlertDispatchRow {
            id,
            report_id: report_id.to_string(),
            recipient_id: recipient.id.clone(),
            channel: recipient.channel,
            state: DispatchState::Pending,
            dispatched_at: now,
        });
    }

    Ok(dispatches)
}

/// Updates one dispatch's delivery state.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_dispatch_state(
    db: &dyn Database,
    dispatch_id: &str,
    state: DispatchState,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE alert_dispatches SET state = $2 WHERE id = $1",
        &[
            DatabaseValue::String(dispatch_id.to_string()),
            DatabaseValue::String(state.as_ref().to_string()),
        ],
    )
    .await?;

    Ok(())
}

/// Records a RAG query, its answer, and the cited report ids for audit.
///
/// # Errors
///
/// Returns [`DbError`] if the embedding has the wrong dimensionality or the
/// database operation fails.
pub async fn insert_query_record(
    db: &dyn Database,
    question: &str,
    answer: &str,
    related_report_ids: &[String],
    embedding: &[f32],
) -> Result<String, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let literal = vector_literal(embedding)?;
    let related = to_json_text(related_report_ids)?;

    db.exec_raw_params(
        "INSERT INTO query_history (
            id, question, answer, related_report_ids, embedding, asked_at
        ) VALUES ($1, $2, $3, $4, $5::vector, $6)",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::String(question.to_string()),
            DatabaseValue::String(answer.to_string()),
            DatabaseValue::String(related),
            DatabaseValue::String(literal),
            DatabaseValue::DateTime(Utc::now().naive_utc()),
        ],
    )
    .await?;

    Ok(id)
}

/// Lists historical records with the dashboard's filter set, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_historical_records(
    db: &dyn Database,
    query: &HistoricalQuery,
) -> Result<Vec<HistoricalRecordRow>, DbError> {
    let mut sql = String::from(
        "SELECT id, address, neighborhood, latitude, longitude, priority,
                notes, recorded_at
         FROM historical_records WHERE 1=1",
    );

    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(neighborhood) = &query.neighborhood {
        write!(sql, " AND neighborhood = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(neighborhood.clone()));
        param_idx += 1;
    }

    if let Some(priority_min) = query.priority_min {
        write!(sql, " AND priority >= ${param_idx}").unwrap();
        params.push(DatabaseValue::Int32(i32::from(priority_min)));
        param_idx += 1;
    }

    if let Some(search) = &query.search {
        write!(
            sql,
            " AND (address ILIKE '%' || ${param_idx} || '%'
               OR notes ILIKE '%' || ${param_idx} || '%')"
        )
        .unwrap();
        params.push(DatabaseValue::String(search.clone()));
        param_idx += 1;
    }

    sql.push_str(" ORDER BY recorded_at DESC");

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.limit)));
    param_idx += 1;

    write!(sql, " OFFSET ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.offset)));

    let rows = db.query_raw_params(&sql, &params).await?;

    Ok(rows.iter().map(historical_from_row).collect())
}

/// Fetches a single historical record by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_historical_record(
    db: &dyn Database,
    id: &str,
) -> Result<Option<HistoricalRecordRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, address, neighborhood, latitude, longitude, priority,
                    notes, recorded_at
             FROM historical_records WHERE id = $1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    Ok(rows.first().map(historical_from_row))
}

/// Builds the shared `AND ...` filter clauses for report queries.
///
/// Used by both the count and the page query so the two can never drift.
/// `start_idx` is the first free `$n` placeholder.
fn build_report_filters(query: &ReportQuery, start_idx: usize) -> (String, Vec<DatabaseValue>) {
    let mut sql = String::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = start_idx;

    if let Some(status) = query.status {
        write!(sql, " AND status = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(status.as_ref().to_string()));
        param_idx += 1;
    }

    if let Some(severity) = query.severity {
        write!(sql, " AND severity = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(severity.as_ref().to_string()));
        param_idx += 1;
    }

    if let Some(emergency_type) = query.emergency_type {
        write!(sql, " AND emergency_type = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(emergency_type.as_ref().to_string()));
        param_idx += 1;
    }

    if let Some(municipality) = &query.municipality {
        write!(sql, " AND municipality = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(municipality.clone()));
        param_idx += 1;
    }

    if let Some(from) = &query.from {
        write!(sql, " AND received_at >= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(from.naive_utc()));
        param_idx += 1;
    }

    if let Some(to) = &query.to {
        write!(sql, " AND received_at <= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(to.naive_utc()));
        param_idx += 1;
    }

    if let Some(search) = &query.search {
        write!(
            sql,
            " AND (transcription ILIKE '%' || ${param_idx} || '%'
               OR location_text ILIKE '%' || ${param_idx} || '%')"
        )
        .unwrap();
        params.push(DatabaseValue::String(search.clone()));
    }

    (sql, params)
}

/// Converts a database row into a [`ReportRow`].
///
/// Conversion is lenient the way the rest of the read path is: unexpected
/// enum labels fall back to conservative defaults instead of failing the
/// whole page.
fn report_from_row(row: &switchy_database::Row) -> ReportRow {
    let type_name: String = row.to_value("emergency_type").unwrap_or_default();
    let severity_name: String = row.to_value("severity").unwrap_or_default();
    let status_name: String = row.to_value("status").unwrap_or_default();

    let infrastructure_json: String = row.to_value("affected_infrastructure").unwrap_or_default();
    let actions_json: String = row.to_value("immediate_actions").unwrap_or_default();

    let received_at_naive: chrono::NaiveDateTime = row.to_value("received_at").unwrap_or_default();
    let updated_at_naive: chrono::NaiveDateTime = row.to_value("updated_at").unwrap_or_default();

    let lat: Option<f64> = row.to_value("latitude").unwrap_or(None);
    let lng: Option<f64> = row.to_value("longitude").unwrap_or(None);

    ReportRow {
        id: row.to_value("id").unwrap_or_default(),
        reporter_phone: row.to_value("reporter_phone").unwrap_or_default(),
        audio_ref: row.to_value("audio_ref").unwrap_or_default(),
        transcription: row.to_value("transcription").unwrap_or_default(),
        transcription_confidence: row.to_value("transcription_confidence").unwrap_or(0.0),
        emergency_type: type_name.parse().unwrap_or(EmergencyType::Other),
        subtype: row.to_value("subtype").unwrap_or(None),
        location_text: row.to_value("location_text").unwrap_or(None),
        coordinates: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        },
        municipality: row.to_value("municipality").unwrap_or(None),
        severity: severity_name.parse().unwrap_or(Severity::Medium),
        affected_infrastructure: from_json_text(&infrastructure_json),
        estimated_impact: row.to_value("estimated_impact").unwrap_or(None),
        immediate_actions: from_json_text(&actions_json),
        status: status_name.parse().unwrap_or(ReportStatus::Pending),
        extraction_complete: row.to_value("extraction_complete").unwrap_or(false),
        received_at: utc(received_at_naive),
        updated_at: utc(updated_at_naive),
    }
}

/// Converts a database row into an [`InterventionRow`].
fn intervention_from_row(row: &switchy_database::Row) -> InterventionRow {
    let status_name: String = row.to_value("status").unwrap_or_default();
    let assigned_at_naive: chrono::NaiveDateTime = row.to_value("assigned_at").unwrap_or_default();
    let completed_at_naive: Option<chrono::NaiveDateTime> =
        row.to_value("completed_at").unwrap_or(None);

    InterventionRow {
        id: row.to_value("id").unwrap_or_default(),
        report_id: row.to_value("report_id").unwrap_or_default(),
        personnel_id: row.to_value("personnel_id").unwrap_or_default(),
        description: row.to_value("description").unwrap_or_default(),
        status: status_name.parse().unwrap_or(InterventionStatus::Pending),
        assigned_at: utc(assigned_at_naive),
        completed_at: completed_at_naive.map(utc),
        notes: row.to_value("notes").unwrap_or(None),
    }
}

/// Converts a database row into a [`HistoricalRecordRow`].
fn historical_from_row(row: &switchy_database::Row) -> HistoricalRecordRow {
    let recorded_at_naive: chrono::NaiveDateTime = row.to_value("recorded_at").unwrap_or_default();
    let lat: Option<f64> = row.to_value("latitude").unwrap_or(None);
    let lng: Option<f64> = row.to_value("longitude").unwrap_or(None);
    let priority: i32 = row.to_value("priority").unwrap_or(1);

    HistoricalRecordRow {
        id: row.to_value("id").unwrap_or_default(),
        address: row.to_value("address").unwrap_or_default(),
        neighborhood: row.to_value("neighborhood").unwrap_or(None),
        coordinates: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        },
        priority: u8::try_from(priority).unwrap_or(1),
        notes: row.to_value("notes").unwrap_or(None),
        recorded_at: utc(recorded_at_naive),
    }
}

fn utc(naive: chrono::NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

/// Serializes a set-valued column to its JSON text representation.
fn to_json_text<T: serde::Serialize>(values: &[T]) -> Result<String, DbError> {
    serde_json::to_string(values).map_err(|e| DbError::Conversion {
        message: format!("Failed to serialize list column: {e}"),
    })
}

/// Deserializes a set-valued column, dropping entries that no longer parse
/// (e.g. a label removed from the taxonomy) instead of failing the row.
fn from_json_text<T: serde::de::DeserializeOwned>(raw: &str) -> Vec<T> {
    serde_json::from_str::<Vec<serde_json::Value>>(raw)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_filters_number_params_sequentially() {
        let query = ReportQuery {
            status: Some(ReportStatus::Pending),
            severity: Some(Severity::High),
            municipality: Some("Bello".to_string()),
            ..Default::default()
        };

        let (sql, params) = build_report_filters(&query, 1);

        assert!(sql.contains("status = $1"));
        assert!(sql.contains("severity = $2"));
        assert!(sql.contains("municipality = $3"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn report_filters_empty_query_is_a_noop() {
        let (sql, params) = build_report_filters(&ReportQuery::default(), 1);
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn report_filters_search_reuses_one_param() {
        let query = ReportQuery {
            search: Some("deslizamiento".to_string()),
            ..Default::default()
        };

        let (sql, params) = build_report_filters(&query, 1);

        assert_eq!(sql.matches("$1").count(), 2);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn list_columns_roundtrip_through_json_text() {
        let severities = vec![Severity::High, Severity::Critical];
        let json = to_json_text(&severities).unwrap();
        let parsed: Vec<Severity> = from_json_text(&json);
        assert_eq!(parsed, severities);
    }

    #[test]
    fn unknown_labels_are_dropped_from_list_columns() {
        let parsed: Vec<Severity> = from_json_text(r#"["HIGH","NO_SUCH_LEVEL"]"#);
        assert_eq!(parsed, vec![Severity::High]);
    }
}
