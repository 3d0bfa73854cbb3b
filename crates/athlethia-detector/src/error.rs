use athlethia_core::{CollaboratorError, ConfigError, TargetError};
use thiserror::Error;

/// Failure inside a single analyzer. Never aborts sibling analyzers.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Connection, DNS or TLS failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Status code
        status: u16,
        /// URL that returned it
        url: String,
    },

    /// Response was not an HTML page
    #[error("content is not HTML ({content_type})")]
    NotHtml {
        /// Declared content type
        content_type: String,
    },

    /// Response body could not be decoded
    #[error("could not parse response: {0}")]
    Parse(String),

    /// A collaborator (database, classifier, intel) failed
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Nothing to check for this target
    #[error("not applicable: {0}")]
    NotApplicable(String),

    /// Bug or unexpected state inside the analyzer
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// Whether repeating the check soon would give the same answer.
    ///
    /// Stable failures are negative-cached; transient ones are retried on the next scan.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        match self {
            Self::Http { status, .. } => (400..500).contains(status) && *status != 429,
            Self::NotHtml { .. } | Self::Parse(_) => true,
            Self::Network(_)
            | Self::Collaborator(_)
            | Self::NotApplicable(_)
            | Self::Internal(_) => false,
        }
    }
}

impl From<reqwest::Error> for AnalyzerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(describe_error_chain(&err))
    }
}

/// Render an error with all of its sources, e.g. `"error sending request: invalid peer certificate: Expired"`.
pub(crate) fn describe_error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

/// Errors from orchestrator operations other than `scan`, which never fails.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Target could not be normalized
    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    /// Store call failed
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Operation needs a scan store and none is attached
    #[error("no scan store configured")]
    NoStore,
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, ScanError>;
