//! Heuristics over the literal URL string. No network access.

use super::{find_keyword, is_brand_domain, Analyzer, AnalyzerOutput, CREDENTIAL_KEYWORDS};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use athlethia_core::{AnalyzerKind, NormalizedTarget, UrlPatternConfig};
use once_cell::sync::Lazy;
use regex::Regex;

const IP_HOST: f64 = 0.40;
const USERINFO: f64 = 0.30;
const HOMOGRAPH: f64 = 0.35;
const LEET_BRAND: f64 = 0.35;
const TYPOSQUAT: f64 = 0.35;
const BRAND_OUTSIDE_DOMAIN: f64 = 0.25;
const DEEP_SUBDOMAINS: f64 = 0.20;
const LONG_URL: f64 = 0.15;
const PERCENT_ENCODING: f64 = 0.20;
const OBFUSCATED_QUERY: f64 = 0.10;
const SHORTENER: f64 = 0.25;
const ODD_PORT: f64 = 0.10;
const CREDENTIAL_PATH: f64 = 0.15;

/// Percent-encoded octets tolerated before the URL counts as obfuscated.
const MAX_PERCENT_ENCODED: usize = 3;

/// Misspellings of popular brands seen in typosquatting campaigns.
const KNOWN_TYPOS: &[&str] = &[
    "amazom", "arnazon", "amazn", "gooogle", "googel", "gogle", "facebok", "faceboook",
    "facebbok", "microsft", "mircosoft", "micrsoft", "paipal", "paypall", "netflx", "netfiix",
    "whatsap", "instagarm", "telegarm", "coinbasse", "binanse", "safarlcom",
];

static PERCENT_OCTET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("valid regex"));

static BASE64_BLOB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9+/_-]{40,}={0,2}").expect("valid regex"));

/// Scores suspicious structure in the URL itself.
pub struct UrlPatternAnalyzer {
    config: UrlPatternConfig,
}

impl UrlPatternAnalyzer {
    /// Create an analyzer with the given thresholds and lists.
    #[must_use]
    pub fn new(config: UrlPatternConfig) -> Self {
        Self { config }
    }

    fn inspect(&self, target: &NormalizedTarget) -> AnalyzerOutput {
        let mut output = AnalyzerOutput::new();
        let host = target.host().to_lowercase();
        let tokens = host_tokens(&host);

        if target.is_ip_literal() {
            output.add(IP_HOST, format!("IP-literal host {} instead of a domain name", host));
        }

        if target.has_userinfo() {
            output.add(
                USERINFO,
                "URL embeds credentials before '@', hiding the real host",
            );
        }

        if let Some(reason) = homograph_reason(&host, target.ascii_host()) {
            output.add(HOMOGRAPH, format!("Possible homograph host: {reason}"));
        }

        if let Some((token, brand)) = self.leet_brand(&tokens) {
            output.add(
                LEET_BRAND,
                format!("'{token}' imitates the brand '{brand}' with digit substitution"),
            );
        }

        if let Some(typo) = KNOWN_TYPOS.iter().find(|typo| host.contains(*typo)) {
            output.add(TYPOSQUAT, format!("Host contains known typosquat '{typo}'"));
        }

        if let Some(brand) = self.brand_outside_domain(&tokens, target.registrable_domain()) {
            output.add(
                BRAND_OUTSIDE_DOMAIN,
                format!(
                    "Brand '{brand}' appears outside the registrable domain {}",
                    target.registrable_domain()
                ),
            );
        }

        let depth = target.subdomain_labels().len();
        if depth > self.config.max_subdomain_depth {
            output.add(DEEP_SUBDOMAINS, format!("{depth} subdomain levels"));
        }

        let length = target.as_str().chars().count();
        if length > self.config.max_url_length {
            output.add(LONG_URL, format!("Unusually long URL ({length} characters)"));
        }

        let encoded = PERCENT_OCTET.find_iter(target.fetch_url()).count();
        if encoded > MAX_PERCENT_ENCODED {
            output.add(
                PERCENT_ENCODING,
                format!("{encoded} percent-encoded characters"),
            );
        }

        if let Some(query) = target.query() {
            if query.len() > self.config.max_query_length {
                output.add(
                    OBFUSCATED_QUERY,
                    format!("Long query string ({} characters)", query.len()),
                );
            } else if BASE64_BLOB.is_match(query) {
                output.add(OBFUSCATED_QUERY, "Query carries an encoded blob");
            }
        }

        if self.is_shortener(&host) {
            output.add(SHORTENER, format!("URL shortener {host} hides the destination"));
        }

        if let Some(port) = target.port() {
            if port != 80 && port != 443 {
                output.add(ODD_PORT, format!("Non-standard port {port}"));
            }
        }

        let path = target.path().to_lowercase();
        if let Some(keyword) = find_keyword(&path, CREDENTIAL_KEYWORDS) {
            output.add(
                CREDENTIAL_PATH,
                format!("Path contains credential keyword '{keyword}'"),
            );
        }

        output
    }

    fn leet_brand<'a>(&'a self, tokens: &[&'a str]) -> Option<(&'a str, &'a str)> {
        tokens.iter().find_map(|token| {
            if !token.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }
            let plain = deleet(token);
            self.config
                .brands
                .iter()
                .find(|brand| plain == brand.as_str())
                .map(|brand| (*token, brand.as_str()))
        })
    }

    fn brand_outside_domain<'a>(
        &'a self,
        tokens: &[&str],
        registrable_domain: &str,
    ) -> Option<&'a str> {
        self.config
            .brands
            .iter()
            .map(String::as_str)
            .find(|brand| tokens.contains(brand) && !is_brand_domain(registrable_domain, brand))
    }

    fn is_shortener(&self, host: &str) -> bool {
        self.config.shorteners.iter().any(|shortener| {
            host == shortener
                || host
                    .strip_suffix(shortener.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[async_trait]
impl Analyzer for UrlPatternAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::UrlPattern
    }

    async fn analyze(&self, target: &NormalizedTarget) -> Result<AnalyzerOutput, AnalyzerError> {
        Ok(self.inspect(target))
    }
}

/// Host split on dots and hyphens.
fn host_tokens(host: &str) -> Vec<&str> {
    host.split(['.', '-']).filter(|t| !t.is_empty()).collect()
}

/// Undo common digit-for-letter substitutions.
fn deleet(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'l',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '7' => 't',
            '8' => 'b',
            other => other,
        })
        .collect()
}

fn homograph_reason(host: &str, ascii_host: &str) -> Option<&'static str> {
    let has_latin = host.chars().any(|c| c.is_ascii_alphabetic());
    let has_cyrillic = host.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c));
    let has_greek = host.chars().any(|c| ('\u{0370}'..='\u{03FF}').contains(&c));

    if (has_latin && (has_cyrillic || has_greek)) || (has_cyrillic && has_greek) {
        Some("mixed Latin, Cyrillic or Greek characters")
    } else if ascii_host.split('.').any(|label| label.starts_with("xn--")) {
        Some("internationalized (punycode) label")
    } else {
        None
    }
}
