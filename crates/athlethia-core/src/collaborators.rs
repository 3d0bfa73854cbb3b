//! Contracts for the systems the detector talks to but does not own.
//!
//! All collaborator implementations must be thread-safe (Send + Sync); the
//! orchestrator shares them across concurrently running analyzer tasks.

use crate::error::CollaboratorError;
use crate::types::{ScamRecord, ScanResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable store for scan history and community reports.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persist a finished scan for audit.
    async fn save(&self, result: &ScanResult) -> Result<(), CollaboratorError>;

    /// Record a community report against a domain and return the updated record.
    async fn record_report(
        &self,
        domain: &str,
        reporter_context: &str,
    ) -> Result<ScamRecord, CollaboratorError>;
}

/// Read path for known-scam lookups.
#[async_trait]
pub trait ScamDatabase: Send + Sync {
    /// Look up a domain. `Ok(None)` means no report exists.
    async fn lookup(&self, domain: &str) -> Result<Option<ScamRecord>, CollaboratorError>;
}

/// Optional AI text classifier used by content analysis.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Score page text in [0, 1]. `Ok(None)` means the model is unavailable.
    async fn classify_text(&self, text: &str) -> Result<Option<f64>, CollaboratorError>;
}

/// Registration and reputation data for a domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainIntelReport {
    /// When the domain was registered, if known
    pub registered_at: Option<DateTime<Utc>>,
    /// Reputation feed score in [0, 1] (1 = known bad), if known
    pub reputation: Option<f64>,
}

/// Optional source of domain age and reputation.
#[async_trait]
pub trait DomainIntel: Send + Sync {
    /// Fetch what is known about a registrable domain.
    async fn lookup(&self, domain: &str) -> Result<DomainIntelReport, CollaboratorError>;
}
