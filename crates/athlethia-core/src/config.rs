//! Configuration management for Athlethia.
//!
//! Provides TOML-based configuration with XDG-compliant paths, environment
//! variable overrides and validation. A configuration that fails
//! [`AppConfig::validate`] must never be used to serve scans.

use crate::error::{ConfigError, ConfigResult};
use crate::types::AnalyzerKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest cache lifetime, in seconds, any TTL setting may ask for (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Main application configuration.
///
/// This is loaded from `~/.config/athlethia/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Per-analyzer timeouts and cache TTLs
    pub analyzers: AnalyzerTable,
    /// Aggregation weights and verdict thresholds
    pub scoring: ScoringConfig,
    /// Signal cache behaviour
    pub cache: CacheConfig,
    /// Page fetching and content heuristics
    pub content: ContentConfig,
    /// Domain reputation heuristics
    pub domain: DomainConfig,
    /// URL string heuristics
    pub url_pattern: UrlPatternConfig,
    /// Known-scam lookup scoring
    pub known_scam: KnownScamConfig,
    /// Scan persistence
    pub persistence: PersistenceConfig,
    /// Bundled SQLite store
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from the default path, falling back to defaults if not found.
    ///
    /// The loaded configuration is validated before it is returned.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ATHLETHIA_LOW_THRESHOLD`: Override the Safe/Suspicious boundary
    /// - `ATHLETHIA_HIGH_THRESHOLD`: Override the Suspicious/Scam boundary
    /// - `ATHLETHIA_DATABASE_PATH`: Override the SQLite database path
    /// - `ATHLETHIA_CONTENT_MAX_REDIRECTS`: Override the redirect limit for page fetches
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ATHLETHIA_LOW_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.scoring.low_threshold = threshold;
                tracing::debug!("Override scoring.low_threshold from env: {}", threshold);
            }
        }

        if let Some(val) = lookup("ATHLETHIA_HIGH_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.scoring.high_threshold = threshold;
                tracing::debug!("Override scoring.high_threshold from env: {}", threshold);
            }
        }

        if let Some(val) = lookup("ATHLETHIA_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", val);
            self.database.path = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("ATHLETHIA_CONTENT_MAX_REDIRECTS") {
            if let Ok(max) = val.parse() {
                self.content.max_redirects = max;
                tracing::debug!("Override content.max_redirects from env: {}", max);
            }
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/athlethia/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("org", "athlethia", "athlethia").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/athlethia`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("org", "athlethia", "athlethia").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Database file path: the configured one, or `athlethia.db` in the data directory.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("athlethia.db")),
        }
    }

    /// Check every value the detector relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        for kind in AnalyzerKind::ALL {
            let settings = self.analyzers.get(kind);
            if settings.timeout_ms == 0 {
                return Err(ConfigError::invalid(
                    &format!("analyzers.{kind}.timeout_ms"),
                    "must be greater than zero",
                ));
            }
            check_ttl(&format!("analyzers.{kind}.cache_ttl_secs"), settings.cache_ttl_secs)?;
        }
        check_ttl("cache.negative_ttl_secs", self.cache.negative_ttl_secs)?;
        check_ttl("known_scam.confirmed_ttl_secs", self.known_scam.confirmed_ttl_secs)?;

        self.scoring.validate()?;

        if !(0.0..=1.0).contains(&self.content.ai_blend_weight) {
            return Err(ConfigError::invalid(
                "content.ai_blend_weight",
                "must be within [0, 1]",
            ));
        }
        if self.content.max_bytes == 0 {
            return Err(ConfigError::invalid("content.max_bytes", "must be greater than zero"));
        }

        if self.domain.age_decay_days <= 0.0 || !self.domain.age_decay_days.is_finite() {
            return Err(ConfigError::invalid("domain.age_decay_days", "must be positive"));
        }
        check_unit("domain.max_age_score", self.domain.max_age_score)?;
        check_unit("domain.reputation_weight", self.domain.reputation_weight)?;

        if self.known_scam.report_saturation <= 0.0 || !self.known_scam.report_saturation.is_finite()
        {
            return Err(ConfigError::invalid(
                "known_scam.report_saturation",
                "must be positive",
            ));
        }
        check_unit("known_scam.confirmed_score", self.known_scam.confirmed_score)?;
        check_unit("known_scam.max_unconfirmed_score", self.known_scam.max_unconfirmed_score)?;

        Ok(())
    }
}

fn check_ttl(field: &str, secs: u64) -> ConfigResult<()> {
    if secs <= MAX_TTL_SECS {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{secs} exceeds the maximum of {MAX_TTL_SECS} seconds"),
        ))
    }
}

fn check_unit(field: &str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")))
    }
}

/// Timeout and cache lifetime for one analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// How long a completed result stays in the signal cache
    pub cache_ttl_secs: u64,
}

impl AnalyzerSettings {
    const fn new(timeout_ms: u64, cache_ttl_secs: u64) -> Self {
        Self {
            timeout_ms,
            cache_ttl_secs,
        }
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::new(3000, 3600)
    }
}

/// Settings for each analyzer, one TOML table per analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerTable {
    /// `[analyzers.url_pattern]`
    pub url_pattern: AnalyzerSettings,
    /// `[analyzers.domain_reputation]`
    pub domain_reputation: AnalyzerSettings,
    /// `[analyzers.content]`
    pub content: AnalyzerSettings,
    /// `[analyzers.ssl_certificate]`
    pub ssl_certificate: AnalyzerSettings,
    /// `[analyzers.known_scam_lookup]`
    pub known_scam_lookup: AnalyzerSettings,
}

impl AnalyzerTable {
    /// Settings for one analyzer. The synthetic parser signal uses URL-pattern settings.
    #[must_use]
    pub fn get(&self, kind: AnalyzerKind) -> AnalyzerSettings {
        match kind {
            AnalyzerKind::UrlPattern | AnalyzerKind::TargetParser => self.url_pattern,
            AnalyzerKind::DomainReputation => self.domain_reputation,
            AnalyzerKind::Content => self.content,
            AnalyzerKind::SslCertificate => self.ssl_certificate,
            AnalyzerKind::KnownScamLookup => self.known_scam_lookup,
        }
    }
}

impl Default for AnalyzerTable {
    fn default() -> Self {
        Self {
            url_pattern: AnalyzerSettings::new(500, 86_400),
            domain_reputation: AnalyzerSettings::new(3000, 43_200),
            content: AnalyzerSettings::new(5000, 900),
            ssl_certificate: AnalyzerSettings::new(4000, 3600),
            known_scam_lookup: AnalyzerSettings::new(1500, 3600),
        }
    }
}

/// Relative weight of each analyzer in the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// URL string heuristics
    pub url_pattern: f64,
    /// Domain reputation
    pub domain_reputation: f64,
    /// Page content
    pub content: f64,
    /// TLS certificate
    pub ssl_certificate: f64,
    /// Known-scam lookup when it finds a record
    pub known_scam_lookup: f64,
    /// Known-scam lookup when no record exists. Absence of reports says
    /// little about a link, so it must not outweigh the heuristics.
    pub known_scam_miss: f64,
}

impl ScoringWeights {
    /// Weight for one analyzer. The synthetic parser signal never carries weight.
    #[must_use]
    pub fn get(&self, kind: AnalyzerKind) -> f64 {
        match kind {
            AnalyzerKind::UrlPattern => self.url_pattern,
            AnalyzerKind::DomainReputation => self.domain_reputation,
            AnalyzerKind::Content => self.content,
            AnalyzerKind::SslCertificate => self.ssl_certificate,
            AnalyzerKind::KnownScamLookup => self.known_scam_lookup,
            AnalyzerKind::TargetParser => 0.0,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            url_pattern: 1.0,
            domain_reputation: 1.25,
            content: 1.75,
            ssl_certificate: 1.25,
            known_scam_lookup: 2.0,
            known_scam_miss: 0.25,
        }
    }
}

/// Aggregation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Confidence below this is `Safe`
    pub low_threshold: f64,
    /// Confidence at or above this is `Scam`
    pub high_threshold: f64,
    /// Minimum confidence when the scam database confirms the domain
    pub confirmed_floor: f64,
    /// Confidence reported when no analyzer completed
    pub insufficient_data_confidence: f64,
    /// Confidence reported when the target cannot be parsed
    pub unparseable_confidence: f64,
    /// Per-analyzer weights
    pub weights: ScoringWeights,
}

impl ScoringConfig {
    /// Check threshold ordering and the fixed confidences.
    pub fn validate(&self) -> ConfigResult<()> {
        check_unit("scoring.low_threshold", self.low_threshold)?;
        check_unit("scoring.high_threshold", self.high_threshold)?;
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::invalid(
                "scoring.low_threshold",
                format!(
                    "must be below high_threshold ({} >= {})",
                    self.low_threshold, self.high_threshold
                ),
            ));
        }

        check_unit("scoring.confirmed_floor", self.confirmed_floor)?;
        if self.confirmed_floor < self.high_threshold {
            return Err(ConfigError::invalid(
                "scoring.confirmed_floor",
                "must be at or above high_threshold so confirmed scams are always Scam",
            ));
        }

        for (field, value) in [
            (
                "scoring.insufficient_data_confidence",
                self.insufficient_data_confidence,
            ),
            ("scoring.unparseable_confidence", self.unparseable_confidence),
        ] {
            if !(self.low_threshold..self.high_threshold).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    "must fall in the Suspicious band [low_threshold, high_threshold)",
                ));
            }
        }

        let mut total = 0.0;
        for kind in AnalyzerKind::ALL {
            let weight = self.weights.get(kind);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::invalid(
                    &format!("scoring.weights.{kind}"),
                    "must be a non-negative number",
                ));
            }
            total += weight;
        }
        let miss = self.weights.known_scam_miss;
        if !miss.is_finite() || miss < 0.0 {
            return Err(ConfigError::invalid(
                "scoring.weights.known_scam_miss",
                "must be a non-negative number",
            ));
        }
        if total <= 0.0 {
            return Err(ConfigError::invalid(
                "scoring.weights",
                "at least one analyzer needs a positive weight",
            ));
        }

        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.3,
            high_threshold: 0.7,
            confirmed_floor: 0.95,
            insufficient_data_confidence: 0.5,
            unparseable_confidence: 0.5,
            weights: ScoringWeights::default(),
        }
    }
}

/// Signal cache behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for stable analyzer failures
    pub negative_ttl_secs: u64,
    /// Interval of the background sweep (0 disables it)
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            negative_ttl_secs: 120,
            sweep_interval_secs: 300,
        }
    }
}

/// Page fetching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Maximum body bytes read from a page
    pub max_bytes: usize,
    /// Redirect hops followed before the chain is treated as suspicious
    pub max_redirects: usize,
    /// User agent sent with page fetches
    pub user_agent: String,
    /// Share of the content score taken from the AI classifier when it answers
    pub ai_blend_weight: f64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            max_redirects: 5,
            user_agent: "Athlethia/0.1 (+https://github.com/athlethia/athlethia)".to_string(),
            ai_blend_weight: 0.4,
        }
    }
}

/// Domain reputation heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Historically abused TLDs
    pub risky_tlds: Vec<String>,
    /// Decay constant (days) of the young-domain score
    pub age_decay_days: f64,
    /// Score of a domain registered today
    pub max_age_score: f64,
    /// Share of the reputation feed score in the domain score
    pub reputation_weight: f64,
    /// Query RDAP for registration dates
    pub rdap_enabled: bool,
    /// RDAP bootstrap endpoint; the domain is appended
    pub rdap_base_url: String,
    /// Redirects followed from the bootstrap endpoint to the registry's server
    pub rdap_max_redirects: usize,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            risky_tlds: [
                "tk", "ml", "ga", "cf", "gq", "xyz", "top", "click", "download", "stream",
                "zip", "mov", "work", "loan", "country", "kim", "rest", "fit", "cam", "icu",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            age_decay_days: 90.0,
            max_age_score: 0.6,
            reputation_weight: 0.5,
            rdap_enabled: false,
            rdap_base_url: "https://rdap.org/domain/".to_string(),
            rdap_max_redirects: 3,
        }
    }
}

/// URL string heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPatternConfig {
    /// Subdomain labels allowed before the depth indicator fires
    pub max_subdomain_depth: usize,
    /// URL length above which the URL counts as unusually long
    pub max_url_length: usize,
    /// Query length above which the query counts as obfuscated
    pub max_query_length: usize,
    /// Known URL shortener hosts
    pub shorteners: Vec<String>,
    /// Brand names commonly impersonated
    pub brands: Vec<String>,
}

impl Default for UrlPatternConfig {
    fn default() -> Self {
        Self {
            max_subdomain_depth: 3,
            max_url_length: 200,
            max_query_length: 120,
            shorteners: [
                "bit.ly", "tinyurl.com", "t.co", "goo.gl", "ow.ly", "is.gd", "buff.ly",
                "cutt.ly", "rebrand.ly", "shorturl.at", "rb.gy", "tiny.cc",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            brands: [
                "paypal", "apple", "google", "microsoft", "amazon", "facebook", "instagram",
                "whatsapp", "telegram", "netflix", "binance", "coinbase", "metamask", "dhl",
                "fedex", "ups", "wellsfargo", "chase", "mpesa", "safaricom",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// Known-scam lookup scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownScamConfig {
    /// Score for a confirmed record
    pub confirmed_score: f64,
    /// Reports needed to reach ~63% of `max_unconfirmed_score`
    pub report_saturation: f64,
    /// Ceiling for unconfirmed records
    pub max_unconfirmed_score: f64,
    /// Cache TTL for confirmed hits
    pub confirmed_ttl_secs: u64,
}

impl Default for KnownScamConfig {
    fn default() -> Self {
        Self {
            confirmed_score: 0.99,
            report_saturation: 5.0,
            max_unconfirmed_score: 0.85,
            confirmed_ttl_secs: 86_400,
        }
    }
}

/// Scan persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Upper bound on waiting for the store to accept a scan
    pub timeout_ms: u64,
}

impl PersistenceConfig {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

/// Bundled SQLite store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to the data directory
    pub path: Option<PathBuf>,
}
