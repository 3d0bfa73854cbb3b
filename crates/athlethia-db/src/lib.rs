//! Athlethia Database Layer
//!
//! `SQLite` persistence for the detector: scan history, the community scam
//! database and the individual reports behind it. Uses `SQLx` with embedded,
//! versioned migrations.
//!
//! [`Database`] implements both [`ScanStore`] and [`ScamDatabase`], so a single
//! handle can be given to the orchestrator for writes and known-scam lookups.
//!
//! # Example
//!
//! ```ignore
//! use athlethia_db::Database;
//!
//! let db = Database::open("athlethia.db").await?;
//! let record = db.confirm_scam("paypa1-secure.com", "phishing").await?;
//! assert!(record.confirmed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod known_scams;
pub mod migrations;
pub mod scan_results;
pub mod user_reports;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use scan_results::ScanStats;
pub use user_reports::UserReport;

use async_trait::async_trait;
use athlethia_core::{CollaboratorError, ScamDatabase, ScamRecord, ScanResult, ScanStore};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use uuid::Uuid;

/// High-level database handle.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the database at `path` (or `:memory:`) without migrating.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::new(path).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Migrated in-memory database, used by tests and one-off runs.
    pub async fn in_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Store a finished scan.
    pub async fn insert_scan(&self, result: &ScanResult) -> Result<()> {
        scan_results::insert_scan(&self.pool, result).await?;
        Ok(())
    }

    /// Fetch a stored scan.
    ///
    /// # Errors
    /// Returns `DatabaseError::NotFound` if no scan has this ID.
    pub async fn get_scan(&self, id: &Uuid) -> Result<ScanResult> {
        scan_results::get_scan(&self.pool, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("scan {id} not found")))
    }

    /// Most recent scans first.
    pub async fn recent_scans(&self, limit: u32) -> Result<Vec<ScanResult>> {
        Ok(scan_results::recent_scans(&self.pool, limit).await?)
    }

    /// Latest stored scan for a canonical URL, if any.
    pub async fn latest_scan_for(&self, url: &str) -> Result<Option<ScanResult>> {
        Ok(scan_results::latest_scan_for(&self.pool, url).await?)
    }

    /// Aggregate counts over the scan history.
    pub async fn stats(&self) -> Result<ScanStats> {
        Ok(scan_results::stats(&self.pool).await?)
    }

    /// Look up a domain in the community scam database.
    pub async fn lookup_scam(&self, domain: &str) -> Result<Option<ScamRecord>> {
        Ok(known_scams::lookup(&self.pool, domain).await?)
    }

    /// File a report against `domain` and bump its report count.
    pub async fn report_scam(
        &self,
        domain: &str,
        reported_by: &str,
        reason: Option<&str>,
    ) -> Result<ScamRecord> {
        let mut tx = self.pool.begin().await?;
        user_reports::insert_report(&mut *tx, domain, reported_by, reason).await?;
        let record = known_scams::upsert_report(&mut *tx, domain).await?;
        tx.commit().await?;
        tracing::info!(
            "Report filed against {} by {} ({} total)",
            domain,
            reported_by,
            record.report_count
        );
        Ok(record)
    }

    /// Mark a domain as a confirmed scam.
    pub async fn confirm_scam(&self, domain: &str, scam_type: &str) -> Result<ScamRecord> {
        Ok(known_scams::confirm_scam(&self.pool, domain, scam_type).await?)
    }

    /// Reports filed against a domain, newest first.
    pub async fn list_reports(&self, domain: &str) -> Result<Vec<UserReport>> {
        Ok(user_reports::list_reports(&self.pool, domain).await?)
    }
}

#[async_trait]
impl ScanStore for Database {
    async fn save(&self, result: &ScanResult) -> std::result::Result<(), CollaboratorError> {
        self.insert_scan(result).await.map_err(CollaboratorError::from)
    }

    async fn record_report(
        &self,
        domain: &str,
        reporter_context: &str,
    ) -> std::result::Result<ScamRecord, CollaboratorError> {
        self.report_scam(domain, reporter_context, None)
            .await
            .map_err(CollaboratorError::from)
    }
}

#[async_trait]
impl ScamDatabase for Database {
    async fn lookup(
        &self,
        domain: &str,
    ) -> std::result::Result<Option<ScamRecord>, CollaboratorError> {
        self.lookup_scam(domain).await.map_err(CollaboratorError::from)
    }
}
