//! HTTP handler functions for the emergency-line API.

use actix_web::{HttpResponse, web};
use emergency_line_database::{DbError, queries};
use emergency_line_database_models::{HistoricalQuery, NewIntervention, ReportQuery};
use emergency_line_ingest::pipeline::{InboundVoiceMessage, process_voice_message};
use emergency_line_server_models::{
    ApiError, ApiHealth, ApiHistoricalRecord, ApiIntervention, ApiPagination, ApiRelatedReport,
    ApiReport, ApiReportDetail, DistributeRequest, DistributeResponse, HistoricalQueryParams,
    NewInterventionRequest, QueryRequest, QueryResponse, ReportListResponse, ReportQueryParams,
    UpdateInterventionRequest, UpdateStatusRequest, WebhookAck, WebhookVerifyParams,
};
use emergency_line_whatsapp::webhook::WebhookPayload;

use crate::AppState;

/// Default page size for the reports list.
const DEFAULT_PAGE_SIZE: u32 = 20;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/webhooks/whatsapp`
///
/// Provider verification handshake: echoes `hub.challenge` when the mode
/// and token match, 403 otherwise.
pub async fn webhook_verify(
    state: web::Data<AppState>,
    params: web::Query<WebhookVerifyParams>,
) -> HttpResponse {
    let mode = params.mode.as_deref().unwrap_or_default();
    let token = params.verify_token.as_deref().unwrap_or_default();

    if emergency_line_whatsapp::verify_webhook(state.verify_token.as_deref(), mode, token) {
        log::info!("WhatsApp webhook verified");
        return HttpResponse::Ok().body(params.challenge.clone().unwrap_or_default());
    }

    HttpResponse::Forbidden().json(ApiError::new("Verification failed"))
}

/// `POST /api/webhooks/whatsapp`
///
/// Receives the provider envelope and runs the ingestion pipeline for the
/// first audio message. Malformed or empty envelopes and non-audio
/// messages are acknowledged with a non-error status token so the
/// provider doesn't retry them.
pub async fn webhook_receive(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let payload: WebhookPayload = match serde_json::from_value(body.into_inner()) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Unparseable webhook payload: {e}");
            return HttpResponse::Ok().json(WebhookAck::no_messages());
        }
    };

    let Some(message) = payload.first_message() else {
        return HttpResponse::Ok().json(WebhookAck::no_messages());
    };

    if !message.is_audio() {
        log::info!("Ignoring non-audio message ({})", message.message_type);
        return HttpResponse::Ok().json(WebhookAck::ignored_non_audio());
    }

    let inbound = InboundVoiceMessage {
        sender: message.from.clone(),
        media_id: message
            .audio
            .as_ref()
            .map(|a| a.id.clone())
            .unwrap_or_default(),
        received_at: message.received_at(),
    };

    match process_voice_message(
        state.db.clone(),
        state.ai.clone(),
        state.whatsapp.clone(),
        inbound,
    )
    .await
    {
        Ok(report) => HttpResponse::Ok().json(WebhookAck::success(report.id)),
        Err(e) => {
            log::error!("Webhook processing error: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::with_details("Processing failed", e))
        }
    }
}

/// `GET /api/reports`
///
/// Queries reports with status, severity, type, municipality, date-range,
/// and free-text filters, paginated newest first.
pub async fn list_reports(
    state: web::Data<AppState>,
    params: web::Query<ReportQueryParams>,
) -> HttpResponse {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let query = ReportQuery {
        status: params.status.as_deref().and_then(|s| s.parse().ok()),
        severity: params.severity.as_deref().and_then(|s| s.parse().ok()),
        emergency_type: params.emergency_type.as_deref().and_then(|s| s.parse().ok()),
        municipality: params.municipality.clone(),
        from: params.from,
        to: params.to,
        search: params.search.clone(),
        limit,
        offset: (page - 1) * limit,
    };

    match queries::query_reports(state.db.as_ref(), &query).await {
        Ok(result) => {
            let total_pages = result.total.div_ceil(u64::from(limit));
            HttpResponse::Ok().json(ReportListResponse {
                data: result.rows.into_iter().map(ApiReport::from).collect(),
                pagination: ApiPagination {
                    page,
                    limit,
                    total: result.total,
                    total_pages,
                },
            })
        }
        Err(e) => {
            log::error!("Failed to query reports: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to fetch reports"))
        }
    }
}

/// `GET /api/reports/{id}`
///
/// Returns one report with its interventions.
pub async fn get_report(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();

    let report = match queries::get_report(state.db.as_ref(), &id).await {
        Ok(Some(report)) => report,
        Ok(None) => {
            return HttpResponse::NotFound().json(ApiError::new("Report not found"));
        }
        Err(e) => {
            log::error!("Failed to fetch report {id}: {e}");
            return HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to fetch report"));
        }
    };

    match queries::list_interventions(state.db.as_ref(), &id).await {
        Ok(interventions) => HttpResponse::Ok().json(ApiReportDetail {
            report: report.into(),
            interventions: interventions
                .into_iter()
                .map(ApiIntervention::from)
                .collect(),
        }),
        Err(e) => {
            log::error!("Failed to fetch interventions for {id}: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to fetch report"))
        }
    }
}

/// `PATCH /api/reports/{id}/status`
///
/// Updates a report's lifecycle state. Regressions are rejected with 409 —
/// the lifecycle is forward-only and there is no reopen operation.
pub async fn update_report_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
) -> HttpResponse {
    let id = path.into_inner();

    match queries::update_report_status(state.db.as_ref(), &id, body.status).await {
        Ok(report) => HttpResponse::Ok().json(ApiReport::from(report)),
        Err(DbError::NotFound { .. }) => {
            HttpResponse::NotFound().json(ApiError::new("Report not found"))
        }
        Err(e @ DbError::InvalidTransition { .. }) => {
            HttpResponse::Conflict().json(ApiError::with_details("Invalid status transition", e))
        }
        Err(e) => {
            log::error!("Failed to update report {id} status: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to update report"))
        }
    }
}

/// `POST /api/interventions`
///
/// Creates an intervention; the parent report moves to in-progress as a
/// side effect.
pub async fn create_intervention(
    state: web::Data<AppState>,
    body: web::Json<NewInterventionRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let new_intervention = NewIntervention {
        report_id: body.report_id,
        personnel_id: body.personnel_id,
        description: body.description,
    };

    match queries::insert_intervention(state.db.as_ref(), &new_intervention).await {
        Ok(intervention) => HttpResponse::Ok().json(ApiIntervention::from(intervention)),
        Err(DbError::NotFound { .. }) => {
            HttpResponse::NotFound().json(ApiError::new("Report not found"))
        }
        Err(e) => {
            log::error!("Failed to create intervention: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to create intervention"))
        }
    }
}

/// `PATCH /api/interventions/{id}`
///
/// Updates an intervention's state and/or notes.
pub async fn update_intervention(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateInterventionRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let body = body.into_inner();

    match queries::update_intervention(state.db.as_ref(), &id, body.status, body.notes).await {
        Ok(intervention) => HttpResponse::Ok().json(ApiIntervention::from(intervention)),
        Err(DbError::NotFound { .. }) => {
            HttpResponse::NotFound().json(ApiError::new("Intervention not found"))
        }
        Err(e @ DbError::InvalidTransition { .. }) => {
            HttpResponse::Conflict().json(ApiError::with_details("Invalid status transition", e))
        }
        Err(e) => {
            log::error!("Failed to update intervention {id}: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to update intervention"))
        }
    }
}

/// `POST /api/alerts/distribute`
///
/// Distributes alerts for a report to all eligible recipients.
pub async fn distribute_alerts(
    state: web::Data<AppState>,
    body: web::Json<DistributeRequest>,
) -> HttpResponse {
    match emergency_line_alerts::distribute_alerts(
        state.db.as_ref(),
        Some(state.whatsapp.as_ref()),
        &body.reporte_id,
    )
    .await
    {
        Ok(alerts_sent) => HttpResponse::Ok().json(DistributeResponse {
            success: true,
            alerts_sent,
        }),
        Err(e) => {
            log::error!("Error distributing alerts: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to distribute alerts"))
        }
    }
}

/// `POST /api/queries/rag`
///
/// Answers a natural-language question over the report store.
pub async fn rag_query(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> HttpResponse {
    let Some(question) = body.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    else {
        return HttpResponse::BadRequest().json(ApiError::new("Query is required"));
    };

    match emergency_line_rag::answer_query(state.db.as_ref(), state.ai.as_ref(), question).await {
        Ok(outcome) => HttpResponse::Ok().json(QueryResponse {
            answer: outcome.answer,
            related_reports: outcome
                .related_reports
                .into_iter()
                .map(ApiRelatedReport::from)
                .collect(),
            sources: outcome.sources,
        }),
        Err(e) => {
            log::error!("RAG query error: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::with_details("Failed to process query", e))
        }
    }
}

/// `GET /api/historical`
///
/// Lists historical records with neighborhood, priority, and free-text
/// filters.
pub async fn list_historical(
    state: web::Data<AppState>,
    params: web::Query<HistoricalQueryParams>,
) -> HttpResponse {
    let query = HistoricalQuery {
        neighborhood: params.neighborhood.clone(),
        priority_min: params.priority_min,
        search: params.search.clone(),
        limit: params.limit.unwrap_or(50).clamp(1, 500),
        offset: params.offset.unwrap_or(0),
    };

    match queries::list_historical_records(state.db.as_ref(), &query).await {
        Ok(records) => HttpResponse::Ok().json(
            records
                .into_iter()
                .map(ApiHistoricalRecord::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            log::error!("Failed to query historical records: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::new("Failed to fetch historical records"))
        }
    }
}

/// `GET /api/historical/{id}`
pub async fn get_historical(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();

    match queries::get_historical_record(state.db.as_ref(), &id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(ApiHistoricalRecord::from(record)),
        Ok(None) => HttpResponse::NotFound().json(ApiError::new("Record not found")),
        Err(e) => {
            log::error!("Failed to fetch historical record {id}: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to fetch record"))
        }
    }
}
