//! Shared HTTP client for analyzers that touch the network.

use crate::error::AnalyzerError;
use athlethia_core::ContentConfig;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Build a client that never follows redirects on its own and verifies
/// certificates strictly. Callers that follow redirects do it by hand.
pub fn build_client(config: &ContentConfig, timeout: Duration) -> Result<reqwest::Client, AnalyzerError> {
    client_with_policy(config, timeout, Policy::none())
}

/// Build a client that follows up to `max_redirects` redirects itself.
///
/// For lookup services such as rdap.org that bounce every query to the
/// authoritative server, where the hops carry no signal of their own.
pub fn build_redirecting_client(
    config: &ContentConfig,
    timeout: Duration,
    max_redirects: usize,
) -> Result<reqwest::Client, AnalyzerError> {
    client_with_policy(config, timeout, Policy::limited(max_redirects))
}

fn client_with_policy(
    config: &ContentConfig,
    timeout: Duration,
    policy: Policy,
) -> Result<reqwest::Client, AnalyzerError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(policy)
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| AnalyzerError::Internal(format!("failed to build HTTP client: {e}")))
}
