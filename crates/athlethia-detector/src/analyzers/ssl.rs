//! TLS certificate checks.

use super::{find_keyword, Analyzer, AnalyzerOutput, CREDENTIAL_KEYWORDS};
use crate::error::{describe_error_chain, AnalyzerError};
use async_trait::async_trait;
use athlethia_core::{AnalyzerKind, NormalizedTarget};

const EXPIRED: f64 = 0.70;
const NAME_MISMATCH: f64 = 0.80;
const UNTRUSTED_ISSUER: f64 = 0.70;
const OTHER_CERT_ERROR: f64 = 0.60;
const PLAINTEXT_CREDENTIALS: f64 = 0.60;
const PLAINTEXT: f64 = 0.15;

/// Checks that https targets present a valid, trusted certificate.
pub struct SslAnalyzer {
    client: reqwest::Client,
}

impl SslAnalyzer {
    /// Create the analyzer around a strictly verifying client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Classify a failed TLS request. `None` means the failure was not about the certificate.
fn classify_tls_failure(chain: &str) -> Option<(f64, String)> {
    let lower = chain.to_lowercase();
    if lower.contains("expired") {
        Some((EXPIRED, "Certificate has expired".to_string()))
    } else if lower.contains("notvalidforname")
        || lower.contains("not valid for name")
        || lower.contains("hostname mismatch")
    {
        Some((
            NAME_MISMATCH,
            "Certificate is not valid for this host name".to_string(),
        ))
    } else if lower.contains("unknownissuer")
        || lower.contains("unknown issuer")
        || lower.contains("self-signed")
        || lower.contains("self signed")
    {
        Some((
            UNTRUSTED_ISSUER,
            "Certificate is self-signed or from an untrusted issuer".to_string(),
        ))
    } else if lower.contains("certificate") {
        Some((OTHER_CERT_ERROR, format!("Certificate rejected: {chain}")))
    } else {
        None
    }
}

fn score_plaintext(target: &NormalizedTarget) -> AnalyzerOutput {
    let path_and_query = format!(
        "{}?{}",
        target.path().to_lowercase(),
        target.query().unwrap_or_default().to_lowercase()
    );
    match find_keyword(&path_and_query, CREDENTIAL_KEYWORDS) {
        Some(keyword) => AnalyzerOutput::with_score(
            PLAINTEXT_CREDENTIALS,
            format!("No TLS on a credential or payment page ('{keyword}')"),
        ),
        None => AnalyzerOutput::with_score(PLAINTEXT, "Served over plain HTTP without TLS"),
    }
}

#[async_trait]
impl Analyzer for SslAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::SslCertificate
    }

    async fn analyze(&self, target: &NormalizedTarget) -> Result<AnalyzerOutput, AnalyzerError> {
        if !target.is_https() {
            return Ok(score_plaintext(target));
        }

        match self.client.head(target.fetch_url()).send().await {
            Ok(response) => {
                tracing::debug!(
                    "TLS handshake with {} succeeded (HTTP {})",
                    target.ascii_host(),
                    response.status()
                );
                Ok(AnalyzerOutput::with_score(
                    0.0,
                    "Certificate chain is valid and trusted",
                ))
            }
            Err(e) => {
                let chain = describe_error_chain(&e);
                match classify_tls_failure(&chain) {
                    Some((score, evidence)) => Ok(AnalyzerOutput::with_score(score, evidence)),
                    None => Err(AnalyzerError::Network(chain)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(raw: &str) -> NormalizedTarget {
        NormalizedTarget::parse(raw).expect("valid target")
    }

    #[test]
    fn test_classify_rustls_errors() {
        let expired = classify_tls_failure(
            "error sending request: client error (Connect): invalid peer certificate: Expired",
        )
        .expect("certificate error");
        assert!((expired.0 - EXPIRED).abs() < f64::EPSILON);

        let mismatch =
            classify_tls_failure("invalid peer certificate: NotValidForName").expect("mismatch");
        assert!((mismatch.0 - NAME_MISMATCH).abs() < f64::EPSILON);

        let issuer =
            classify_tls_failure("invalid peer certificate: UnknownIssuer").expect("issuer");
        assert!((issuer.0 - UNTRUSTED_ISSUER).abs() < f64::EPSILON);

        let other = classify_tls_failure("invalid peer certificate: BadSignature").expect("other");
        assert!((other.0 - OTHER_CERT_ERROR).abs() < f64::EPSILON);

        assert!(classify_tls_failure("error trying to connect: Connection refused").is_none());
    }

    #[test]
    fn test_plaintext_login_page() {
        let output = score_plaintext(&target("http://192.168.1.1/login"));
        assert!((output.score - PLAINTEXT_CREDENTIALS).abs() < f64::EPSILON);
        assert!(output.evidence[0].contains("No TLS"));
    }

    #[test]
    fn test_plaintext_payment_query() {
        let output = score_plaintext(&target("http://shop.example.com/cart?step=checkout"));
        assert!((output.score - PLAINTEXT_CREDENTIALS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_plaintext_plain_page_is_low() {
        let output = score_plaintext(&target("http://example.com/blog"));
        assert!((output.score - PLAINTEXT).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_http_target_skips_network() {
        let analyzer = SslAnalyzer::new(reqwest::Client::new());
        let output = analyzer
            .analyze(&target("http://example.com/"))
            .await
            .expect("plain http");
        assert!((output.score - PLAINTEXT).abs() < f64::EPSILON);
    }
}
