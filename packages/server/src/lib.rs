#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the emergency-line backend.
//!
//! Serves the webhook that ingests WhatsApp voice reports, the RAG query
//! endpoint, alert distribution, and the dashboard's report, intervention,
//! and historical-record REST API. Each request is an independent,
//! stateless unit of work — the shared state is connection handles and
//! injected capability objects only.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use emergency_line_ai::AiProvider;
use emergency_line_database::{db, run_migrations};
use emergency_line_whatsapp::WhatsAppClient;
use switchy_database::Database;

/// Shared application state.
pub struct AppState {
    /// Database connection.
    pub db: Arc<dyn Database>,
    /// AI provider (transcription, extraction, embeddings, completions).
    pub ai: Arc<dyn AiProvider>,
    /// WhatsApp Graph API client.
    pub whatsapp: Arc<WhatsAppClient>,
    /// Webhook verification token, from `WHATSAPP_VERIFY_TOKEN`.
    pub verify_token: Option<String>,
}

/// Starts the emergency-line API server.
///
/// Connects to the database, runs migrations, constructs the AI and
/// WhatsApp capability objects from the environment (both degrade to
/// disabled/mock modes when credentials are absent), and starts the
/// Actix-Web HTTP server.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the database connection fails or migrations fail — the
/// process is useless without its store.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .expect("Failed to connect to database");

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .expect("Failed to run migrations");

    let ai = emergency_line_ai::create_provider_from_env();
    let whatsapp = WhatsAppClient::from_env();

    let verify_token = std::env::var("WHATSAPP_VERIFY_TOKEN").ok();
    if verify_token.is_none() {
        log::warn!("WHATSAPP_VERIFY_TOKEN not set. Webhook verification will reject all requests.");
    }

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        ai: Arc::from(ai),
        whatsapp: Arc::new(whatsapp),
        verify_token,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route(
                        "/webhooks/whatsapp",
                        web::get().to(handlers::webhook_verify),
                    )
                    .route(
                        "/webhooks/whatsapp",
                        web::post().to(handlers::webhook_receive),
                    )
                    .route("/reports", web::get().to(handlers::list_reports))
                    .route("/reports/{id}", web::get().to(handlers::get_report))
                    .route(
                        "/reports/{id}/status",
                        web::patch().to(handlers::update_report_status),
                    )
                    .route(
                        "/interventions",
                        web::post().to(handlers::create_intervention),
                    )
                    .route(
                        "/interventions/{id}",
                        web::patch().to(handlers::update_intervention),
                    )
                    .route(
                        "/alerts/distribute",
                        web::post().to(handlers::distribute_alerts),
                    )
                    .route("/queries/rag", web::post().to(handlers::rag_query))
                    .route("/historical", web::get().to(handlers::list_historical))
                    .route(
                        "/historical/{id}",
                        web::get().to(handlers::get_historical),
                    ),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
