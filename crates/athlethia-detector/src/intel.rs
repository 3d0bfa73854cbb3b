//! RDAP-backed domain intelligence.

use async_trait::async_trait;
use athlethia_core::{CollaboratorError, DomainIntel, DomainIntelReport};
use chrono::{DateTime, Utc};
use serde::Deserialize;

const COLLABORATOR: &str = "rdap";

#[derive(Debug, Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapEvent {
    event_action: String,
    event_date: Option<DateTime<Utc>>,
}

/// Looks up registration dates over RDAP. Provides no reputation score.
pub struct RdapDomainIntel {
    client: reqwest::Client,
    base_url: String,
}

impl RdapDomainIntel {
    /// Create a client for an RDAP endpoint such as `https://rdap.org/domain/`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }
}

fn registration_date(body: &RdapDomain) -> Option<DateTime<Utc>> {
    body.events
        .iter()
        .find(|e| e.event_action.eq_ignore_ascii_case("registration"))
        .and_then(|e| e.event_date)
}

#[async_trait]
impl DomainIntel for RdapDomainIntel {
    async fn lookup(&self, domain: &str) -> Result<DomainIntelReport, CollaboratorError> {
        let url = format!("{}{}", self.base_url, domain);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/rdap+json, application/json")
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(COLLABORATOR, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound(domain.to_string()));
        }
        if !status.is_success() {
            return Err(CollaboratorError::backend(
                COLLABORATOR,
                format!("HTTP {status} for {url}"),
            ));
        }

        let body: RdapDomain = response
            .json()
            .await
            .map_err(|e| CollaboratorError::backend(COLLABORATOR, e.to_string()))?;

        Ok(DomainIntelReport {
            registered_at: registration_date(&body),
            reputation: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, build_redirecting_client};
    use athlethia_core::ContentConfig;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const REGISTRATION: &str = r#"{"ldhName":"EXAMPLE.COM","events":[{"eventAction":"registration","eventDate":"1995-08-14T04:00:00Z"}]}"#;

    /// Bootstrap at `/domain/<name>` redirecting to the registry at `/registry/<name>`.
    async fn spawn_rdap_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf[read..]).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => read += n,
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, headers, body) =
                        if let Some(name) = path.strip_prefix("/domain/") {
                            ("302 Found", format!("Location: /registry/{name}\r\n"), "")
                        } else if path == "/registry/example.com" {
                            (
                                "200 OK",
                                "Content-Type: application/rdap+json\r\n".to_string(),
                                REGISTRATION,
                            )
                        } else {
                            ("404 Not Found", String::new(), "")
                        };
                    let response = format!(
                        "HTTP/1.1 {status}\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/domain/")
    }

    #[tokio::test]
    async fn test_lookup_follows_bootstrap_redirect() {
        let base = spawn_rdap_server().await;
        let client =
            build_redirecting_client(&ContentConfig::default(), Duration::from_secs(5), 3)
                .expect("client");
        let intel = RdapDomainIntel::new(client, base);

        let report = intel.lookup("example.com").await.expect("rdap lookup");
        let registered = report.registered_at.expect("registration date");
        assert_eq!(registered.to_rfc3339(), "1995-08-14T04:00:00+00:00");
        assert!(report.reputation.is_none());

        let missing = intel.lookup("unregistered.example").await;
        assert!(matches!(missing, Err(CollaboratorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lookup_without_redirects_fails_on_bootstrap() {
        let base = spawn_rdap_server().await;
        let client = build_client(&ContentConfig::default(), Duration::from_secs(5)).expect("client");
        let intel = RdapDomainIntel::new(client, base);

        assert!(intel.lookup("example.com").await.is_err());
    }

    #[test]
    fn test_parse_registration_event() {
        let body: RdapDomain = serde_json::from_str(
            r#"{
                "ldhName": "EXAMPLE.COM",
                "events": [
                    {"eventAction": "expiration", "eventDate": "2030-08-13T04:00:00Z"},
                    {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"}
                ]
            }"#,
        )
        .expect("valid RDAP body");
        let date = registration_date(&body).expect("registration date");
        assert_eq!(date.to_rfc3339(), "1995-08-14T04:00:00+00:00");
    }

    #[test]
    fn test_missing_events() {
        let body: RdapDomain = serde_json::from_str(r#"{"ldhName": "EXAMPLE.COM"}"#)
            .expect("valid RDAP body");
        assert!(registration_date(&body).is_none());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let intel = RdapDomainIntel::new(reqwest::Client::new(), "https://rdap.org/domain");
        assert_eq!(intel.base_url, "https://rdap.org/domain/");
    }
}
