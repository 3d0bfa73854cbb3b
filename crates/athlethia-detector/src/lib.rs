//! Athlethia Detector - Multi-signal scam link detection.
//!
//! This crate runs the detection pipeline:
//! - Five independent analyzers (URL pattern, domain reputation, page content,
//!   TLS certificate, known-scam lookup), each in its own task with its own timeout
//! - A per-analyzer signal cache keyed by canonical URL, host or registrable domain
//! - A pure aggregator that turns signals into a verdict and confidence
//! - The [`ScanOrchestrator`] tying them together with best-effort persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use athlethia_core::{AppConfig, ScanRequest};
//! use athlethia_detector::ScanOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = ScanOrchestrator::new(AppConfig::default())?;
//! let result = orchestrator
//!     .scan(ScanRequest::new("http://192.168.1.1/login", "cli"))
//!     .await;
//! println!("{} ({:.2})", result.verdict, result.confidence);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod analyzers;
pub mod cache;
pub mod error;
pub mod http;
pub mod intel;
pub mod orchestrator;

pub use aggregator::{aggregate, Assessment};
pub use analyzers::{
    Analyzer, AnalyzerOutput, ContentAnalyzer, DomainAnalyzer, KnownScamAnalyzer, SslAnalyzer,
    UrlPatternAnalyzer,
};
pub use cache::{CacheEntry, CacheKey, CacheStats, SignalCache, MAX_TTL};
pub use error::{AnalyzerError, Result, ScanError};
pub use intel::RdapDomainIntel;
pub use orchestrator::ScanOrchestrator;
