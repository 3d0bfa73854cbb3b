//! Athlethia Core - Foundation crate for the Athlethia scam link detector.
//!
//! This crate provides the shared types, target normalization, configuration
//! management and collaborator contracts that the detector, the database layer
//! and the application shell all depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and validation
//! - [`types`] - Scan requests, signals, verdicts and scan results
//! - [`target`] - Canonical URL normalization used as the cache/dedup key
//! - [`collaborators`] - Traits for the scam database, scan store, AI classifier and domain intel
//!
//! # Example
//!
//! ```rust
//! use athlethia_core::{AppConfig, NormalizedTarget};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let target = NormalizedTarget::parse("Example.com/login#top")?;
//! assert_eq!(target.as_str(), "https://example.com/login");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod target;
pub mod types;

// Re-export commonly used types
pub use collaborators::{DomainIntel, DomainIntelReport, ScamDatabase, ScanStore, TextClassifier};
pub use config::{
    AnalyzerSettings, AnalyzerTable, AppConfig, CacheConfig, ContentConfig, DatabaseConfig,
    DomainConfig, KnownScamConfig, PersistenceConfig, ScoringConfig, ScoringWeights,
    UrlPatternConfig, MAX_TTL_SECS,
};
pub use error::{CollaboratorError, ConfigError, ConfigResult, TargetError};
pub use target::{HostKind, NormalizedTarget};
pub use types::{
    AnalyzerKind, CacheScope, ScamRecord, ScanReport, ScanRequest, ScanResult, SignalResult,
    SignalStatus, SignalSummary, Verdict,
};
