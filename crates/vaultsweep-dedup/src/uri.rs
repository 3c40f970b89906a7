//! Best-effort parsing of the URI-like strings stored on logins.
//!
//! Vault data is messy: bare hostnames, Android app links, IPv6 literals and
//! strings no URL parser accepts all show up. Parsing never fails hard; the
//! result records how much of the input could be trusted.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static ANDROID_APP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^androidapp:(?://)?([^/?#]+)").expect("valid regex"));
static SCHEME_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://").expect("valid regex"));
static AUTHORITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([a-z][a-z0-9+.\-]*)://([^/?#]*)(.*)$").expect("valid regex")
});
static BRACKETED_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\]]*)\](?::(\d*))?$").expect("valid regex"));

/// Whether a location came from a full URL parse or the regex fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFidelity {
    Strict,
    Approximate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLocation {
    /// Lowercased scheme without `://`.
    pub scheme: String,
    /// Lowercased host, brackets and trailing dot removed.
    pub host: String,
    /// Explicit non-default port.
    pub port: Option<String>,
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    /// Fragment without the leading `#`.
    pub fragment: Option<String>,
    pub fidelity: ParseFidelity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriKind {
    AndroidApp { package: String },
    Web(WebLocation),
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub original: String,
    pub kind: UriKind,
}

impl ParsedUri {
    pub fn android_package(&self) -> Option<&str> {
        match &self.kind {
            UriKind::AndroidApp { package } => Some(package),
            _ => None,
        }
    }

    pub fn web(&self) -> Option<&WebLocation> {
        match &self.kind {
            UriKind::Web(location) => Some(location),
            _ => None,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.web().map(|w| w.host.as_str())
    }

    pub fn is_approximate(&self) -> bool {
        self.web()
            .is_some_and(|w| w.fidelity == ParseFidelity::Approximate)
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self.kind, UriKind::Unparseable)
    }
}

/// Parses a stored URI. Returns `None` only for blank input.
pub fn parse(raw: &str) -> Option<ParsedUri> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let kind = if let Some(caps) = ANDROID_APP_RE.captures(trimmed) {
        let package = caps[1].trim_end_matches('.').to_lowercase();
        if package.is_empty() {
            UriKind::Unparseable
        } else {
            UriKind::AndroidApp { package }
        }
    } else {
        let candidate = if SCHEME_PREFIX_RE.is_match(trimmed) {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        match parse_strict(&candidate).or_else(|| parse_fallback(&candidate)) {
            Some(location) => UriKind::Web(location),
            None => UriKind::Unparseable,
        }
    };

    Some(ParsedUri {
        original: raw.to_string(),
        kind,
    })
}

fn parse_strict(candidate: &str) -> Option<WebLocation> {
    let url = Url::parse(candidate).ok()?;
    let host = normalize_host(url.host_str()?)?;

    Some(WebLocation {
        scheme: url.scheme().to_lowercase(),
        host,
        port: url.port().map(|p| p.to_string()),
        path: url.path().to_string(),
        query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        fragment: url.fragment().filter(|f| !f.is_empty()).map(str::to_string),
        fidelity: ParseFidelity::Strict,
    })
}

/// Regex authority extraction for inputs the URL parser rejects.
fn parse_fallback(candidate: &str) -> Option<WebLocation> {
    let caps = AUTHORITY_RE.captures(candidate)?;
    let scheme = caps[1].to_lowercase();
    let authority = &caps[2];
    let rest = caps.get(3).map_or("", |m| m.as_str());

    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    let (host, port) = if let Some(bracketed) = BRACKETED_HOST_RE.captures(host_port) {
        let port = bracketed
            .get(2)
            .map(|m| m.as_str())
            .filter(|p| !p.is_empty());
        (bracketed[1].to_string(), port.map(str::to_string))
    } else if let Some(literal) = host_port.strip_prefix('[') {
        // Anything after the closing bracket that is not a port is dropped.
        let (host, _) = literal.split_once(']')?;
        (host.to_string(), None)
    } else {
        match host_port.rsplit_once(':') {
            Some((host, "")) => (host.to_string(), None),
            Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => {
                (host.to_string(), Some(port.to_string()))
            }
            _ => (host_port.to_string(), None),
        }
    };
    let host = normalize_host(&host)?;

    let (before_fragment, fragment) = match rest.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (rest, None),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (before_fragment, None),
    };

    Some(WebLocation {
        scheme,
        host,
        port,
        path: path.to_string(),
        query: query.filter(|q| !q.is_empty()).map(str::to_string),
        fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        fidelity: ParseFidelity::Approximate,
    })
}

fn normalize_host(host: &str) -> Option<String> {
    let host = host
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_lowercase();
    if host.is_empty() { None } else { Some(host) }
}
