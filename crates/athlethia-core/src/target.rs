//! Canonical target normalization.
//!
//! A [`NormalizedTarget`] is the only key used for caching and deduplication,
//! so two submissions that differ only in case, fragment or tracking
//! parameters must normalize to the same value, and normalizing a canonical
//! string again must return it unchanged.

use crate::error::TargetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use url::{Host, Url};

/// Query parameters that only carry campaign or click tracking data.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "yclid", "_ga",
];

/// Public suffixes made of two labels that are common in scam reports.
///
/// Registrable domains under these keep three labels (`shop.co.uk`).
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "co.nz",
    "co.za", "com.br", "com.cn", "co.jp", "co.in", "co.ke", "com.ng", "com.mx", "com.tr",
    "com.sg", "com.my", "co.id", "com.ar", "com.hk", "com.ph", "com.pk", "com.vn", "co.th",
];

/// What kind of host a target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostKind {
    /// A DNS name
    Domain,
    /// An IPv4 literal
    Ipv4,
    /// An IPv6 literal
    Ipv6,
}

/// Canonical form of a submitted URL or bare domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedTarget {
    canonical: String,
    fetch_url: String,
    scheme: String,
    host: String,
    ascii_host: String,
    host_kind: HostKind,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    has_userinfo: bool,
    registrable_domain: String,
}

impl NormalizedTarget {
    /// Normalize a raw target.
    ///
    /// # Errors
    /// Returns [`TargetError`] when the input is empty, uses a scheme other
    /// than http/https, has no host, or is not a URL at all.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else if let Some(scheme) = explicit_scheme(trimmed) {
            return Err(TargetError::UnsupportedScheme(scheme.to_ascii_lowercase()));
        } else {
            format!("https://{trimmed}")
        };

        let mut url = Url::parse(&with_scheme).map_err(|e| match e {
            url::ParseError::EmptyHost => TargetError::MissingHost,
            other => TargetError::Invalid(other.to_string()),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
        }

        let (host_kind, ascii_host) = match url.host() {
            Some(Host::Domain(d)) => (HostKind::Domain, d.trim_end_matches('.').to_string()),
            Some(Host::Ipv4(ip)) => (HostKind::Ipv4, ip.to_string()),
            Some(Host::Ipv6(ip)) => (HostKind::Ipv6, format!("[{ip}]")),
            None => return Err(TargetError::MissingHost),
        };
        if ascii_host.is_empty() {
            return Err(TargetError::MissingHost);
        }
        // Drop a trailing root dot from the wire form too, so `fetch_url` matches `canonical`
        if host_kind == HostKind::Domain && url.host_str() != Some(ascii_host.as_str()) {
            url.set_host(Some(&ascii_host))
                .map_err(|e| TargetError::Invalid(e.to_string()))?;
        }

        url.set_fragment(None);
        strip_tracking_params(&mut url);

        let host = match host_kind {
            HostKind::Domain => decode_host(&ascii_host),
            HostKind::Ipv4 | HostKind::Ipv6 => ascii_host.clone(),
        };

        let mut canonical = format!("{}://", url.scheme());
        let has_userinfo = !url.username().is_empty() || url.password().is_some();
        if has_userinfo {
            canonical.push_str(url.username());
            if let Some(password) = url.password() {
                canonical.push(':');
                canonical.push_str(password);
            }
            canonical.push('@');
        }
        canonical.push_str(&host);
        if let Some(port) = url.port() {
            let _ = write!(canonical, ":{port}");
        }
        canonical.push_str(url.path());
        if let Some(query) = url.query() {
            canonical.push('?');
            canonical.push_str(query);
        }

        let registrable_domain = match host_kind {
            HostKind::Domain => registrable_domain_of(&host),
            HostKind::Ipv4 | HostKind::Ipv6 => host.clone(),
        };

        Ok(Self {
            canonical,
            fetch_url: url.as_str().to_string(),
            scheme: url.scheme().to_string(),
            host,
            ascii_host,
            host_kind,
            port: url.port(),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            has_userinfo,
            registrable_domain,
        })
    }

    /// The canonical string (unicode host, no fragment, no tracking parameters).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// ASCII (punycode) form of the URL for network requests.
    #[must_use]
    pub fn fetch_url(&self) -> &str {
        &self.fetch_url
    }

    /// `http` or `https`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Whether the target uses TLS.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }

    /// Host with punycode decoded.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host in ASCII form as sent on the wire.
    #[must_use]
    pub fn ascii_host(&self) -> &str {
        &self.ascii_host
    }

    /// Domain name or IP literal.
    #[must_use]
    pub fn host_kind(&self) -> HostKind {
        self.host_kind
    }

    /// Whether the host is a raw IP address.
    #[must_use]
    pub fn is_ip_literal(&self) -> bool {
        self.host_kind != HostKind::Domain
    }

    /// Explicit non-default port, if any.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Path component (always starts with `/`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Whether the authority carries `user[:password]@`.
    #[must_use]
    pub fn has_userinfo(&self) -> bool {
        self.has_userinfo
    }

    /// Host without a leading `www.`: the unit community reports are filed under.
    /// Never widened to `registrable_domain()`, which would cover every site
    /// on a shared host such as `github.io`.
    #[must_use]
    pub fn report_domain(&self) -> &str {
        self.host.strip_prefix("www.").unwrap_or(&self.host)
    }

    /// Registrable domain (eTLD+1). IP literals return the address itself.
    #[must_use]
    pub fn registrable_domain(&self) -> &str {
        &self.registrable_domain
    }

    /// Public suffix of the host, `None` for IP literals and single-label hosts.
    #[must_use]
    pub fn tld(&self) -> Option<&str> {
        if self.is_ip_literal() {
            return None;
        }
        self.registrable_domain
            .split_once('.')
            .map(|(_, suffix)| suffix)
    }

    /// Labels in front of the registrable domain (`a.b` for `a.b.example.com`).
    #[must_use]
    pub fn subdomain_labels(&self) -> Vec<&str> {
        if self.is_ip_literal() || self.host.len() <= self.registrable_domain.len() {
            return Vec::new();
        }
        self.host[..self.host.len() - self.registrable_domain.len()]
            .trim_end_matches('.')
            .split('.')
            .filter(|l| !l.is_empty())
            .collect()
    }
}

impl fmt::Display for NormalizedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

impl TryFrom<String> for NormalizedTarget {
    type Error = TargetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NormalizedTarget> for String {
    fn from(target: NormalizedTarget) -> Self {
        target.canonical
    }
}

/// Detect a non-hierarchical scheme such as `mailto:` or `javascript:`.
///
/// `example.com:8080` is a host and port, not a scheme, so a digit right
/// after the colon means there is no scheme.
fn explicit_scheme(input: &str) -> Option<&str> {
    let (candidate, rest) = input.split_once(':')?;
    let mut chars = candidate.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid = starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let followed_by_port = rest.chars().next().is_some_and(|c| c.is_ascii_digit());
    (valid && !followed_by_port).then_some(candidate)
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

fn strip_tracking_params(url: &mut Url) {
    let Some(query) = url.query() else {
        return;
    };
    if query.is_empty() {
        url.set_query(None);
        return;
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs.iter().any(|(k, _)| is_tracking_param(k)) {
        return;
    }

    let kept: Vec<(String, String)> = pairs
        .into_iter()
        .filter(|(k, _)| !is_tracking_param(k))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
}

fn decode_host(ascii_host: &str) -> String {
    let (unicode, outcome) = idna::domain_to_unicode(ascii_host);
    if outcome.is_ok() {
        unicode
    } else {
        ascii_host.to_string()
    }
}

fn registrable_domain_of(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_LABEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    labels[labels.len() - keep..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> NormalizedTarget {
        NormalizedTarget::parse(raw).expect("valid target")
    }

    #[test]
    fn test_bare_domain_gets_https() {
        let target = parse("example.com");
        assert_eq!(target.as_str(), "https://example.com/");
        assert!(target.is_https());
    }

    #[test]
    fn test_case_and_fragment_are_normalized() {
        let a = parse("https://Example.com/a?x=1#frag");
        let b = parse("https://example.com/a?x=1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://example.com/a?x=1");
    }

    #[test]
    fn test_path_case_is_preserved() {
        let target = parse("HTTP://EXAMPLE.COM/Login/Reset");
        assert_eq!(target.as_str(), "http://example.com/Login/Reset");
    }

    #[test]
    fn test_tracking_params_are_stripped() {
        let target = parse("https://shop.example.com/item?id=42&utm_source=tg&fbclid=abc");
        assert_eq!(target.as_str(), "https://shop.example.com/item?id=42");

        let only_tracking = parse("https://example.com/?utm_campaign=x&gclid=y");
        assert_eq!(only_tracking.as_str(), "https://example.com/");
        assert_eq!(only_tracking.query(), None);
    }

    #[test]
    fn test_default_port_dropped_custom_port_kept() {
        assert_eq!(parse("https://example.com:443/").as_str(), "https://example.com/");
        let custom = parse("http://example.com:8080/admin");
        assert_eq!(custom.as_str(), "http://example.com:8080/admin");
        assert_eq!(custom.port(), Some(8080));
    }

    #[test]
    fn test_host_and_port_without_scheme() {
        let target = parse("localhost:3000/login");
        assert_eq!(target.as_str(), "https://localhost:3000/login");
    }

    #[test]
    fn test_punycode_is_decoded() {
        let target = parse("https://xn--pypal-4ve.com/signin");
        assert_eq!(target.ascii_host(), "xn--pypal-4ve.com");
        assert_ne!(target.host(), target.ascii_host());
        assert!(target.fetch_url().contains("xn--pypal-4ve.com"));
        assert_eq!(parse(target.as_str()), target);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "Example.com",
            "https://Example.com/a?x=1#frag",
            "http://192.168.1.1/login",
            "https://user:pw@Evil.example.co.uk:8443/path?a=b%20c&utm_medium=x",
            "https://xn--pypal-4ve.com/signin",
            "https://[::1]:8080/x",
            "https://example.com/?",
            "https://example.com/search?q=a+b&gclid=1",
            "HTTPS://EXAMPLE.COM.",
            "https://login.example.com./verify",
        ];
        for input in inputs {
            let once = parse(input);
            let twice = parse(once.as_str());
            assert_eq!(once, twice, "normalization not idempotent for {input}");
        }
    }

    #[test]
    fn test_trailing_dot_host() {
        let target = parse("HTTPS://EXAMPLE.COM.");
        assert_eq!(target.as_str(), "https://example.com/");
        assert_eq!(target.fetch_url(), "https://example.com/");
        assert_eq!(target, parse("https://example.com/"));
    }

    #[test]
    fn test_report_domain() {
        assert_eq!(parse("https://www.example.com/x").report_domain(), "example.com");
        assert_eq!(
            parse("https://paypal-login-verify.github.io/").report_domain(),
            "paypal-login-verify.github.io"
        );
        assert_eq!(parse("http://192.168.1.1/login").report_domain(), "192.168.1.1");
    }

    #[test]
    fn test_ip_literals() {
        let v4 = parse("http://192.168.1.1/login");
        assert_eq!(v4.host_kind(), HostKind::Ipv4);
        assert!(v4.is_ip_literal());
        assert_eq!(v4.registrable_domain(), "192.168.1.1");
        assert_eq!(v4.tld(), None);

        let v6 = parse("https://[2001:db8::1]/");
        assert_eq!(v6.host_kind(), HostKind::Ipv6);
        assert_eq!(v6.host(), "[2001:db8::1]");
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(parse("https://a.b.example.com").registrable_domain(), "example.com");
        assert_eq!(parse("https://shop.example.co.uk").registrable_domain(), "example.co.uk");
        assert_eq!(parse("https://shop.example.co.uk").tld(), Some("co.uk"));
        assert_eq!(parse("https://localhost").registrable_domain(), "localhost");
        assert_eq!(
            parse("https://login.paypal.com.secure.example.tk").subdomain_labels(),
            vec!["login", "paypal", "com", "secure"]
        );
    }

    #[test]
    fn test_rejected_inputs() {
        assert_eq!(NormalizedTarget::parse("   "), Err(TargetError::Empty));
        assert!(matches!(
            NormalizedTarget::parse("javascript:alert(1)"),
            Err(TargetError::UnsupportedScheme(s)) if s == "javascript"
        ));
        assert!(matches!(
            NormalizedTarget::parse("mailto:someone@example.com"),
            Err(TargetError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            NormalizedTarget::parse("ftp://files.example.com"),
            Err(TargetError::UnsupportedScheme(_))
        ));
        assert!(NormalizedTarget::parse("https://").is_err());
        assert!(NormalizedTarget::parse("not a url at all").is_err());
    }

    #[test]
    fn test_serde_as_canonical_string() {
        let target = parse("https://Example.com/a#x");
        let json = serde_json::to_string(&target).expect("serialize target");
        assert_eq!(json, "\"https://example.com/a\"");
        let back: NormalizedTarget = serde_json::from_str(&json).expect("deserialize target");
        assert_eq!(back, target);
    }
}
