#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database connection, queries, and migrations for the emergency-line store.
//!
//! Uses `switchy_database` for query execution and `switchy_schema` for
//! embedded SQL migrations. Vector similarity queries use raw SQL via
//! `query_raw_params()` with `pgvector` operators.

pub mod db;
pub mod queries;
pub mod vector;

use emergency_line_report_models::{InterventionStatus, ReportStatus};
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// The requested row does not exist.
    #[error("Not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A lifecycle regression was requested (the lifecycles are
    /// forward-only and no reopen operation exists).
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
}

impl DbError {
    /// Builds an [`DbError::InvalidTransition`] from report statuses.
    #[must_use]
    pub fn report_transition(from: ReportStatus, to: ReportStatus) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Builds an [`DbError::InvalidTransition`] from intervention statuses.
    #[must_use]
    pub fn intervention_transition(from: InterventionStatus, to: InterventionStatus) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}
