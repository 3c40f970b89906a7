use std::net::IpAddr;

use url::Url;

/// Registrable-domain lookup, e.g. `https://a.b.example.co.uk` → `example.co.uk`.
pub trait DomainResolver: Send + Sync {
    /// Returns `None` when the host has no registrable domain.
    fn get_domain(&self, url: &str) -> Option<String>;
}

/// Resolver backed by the compiled-in public suffix list (ICANN and private sections).
#[derive(Debug, Clone, Copy, Default)]
pub struct PslDomainResolver;

impl DomainResolver for PslDomainResolver {
    fn get_domain(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed
            .host_str()?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim_end_matches('.')
            .to_lowercase();

        if host.is_empty() {
            return None;
        }
        if host == "localhost" || is_ip_literal(&host) {
            return Some(host);
        }

        psl::domain_str(&host).map(str::to_string)
    }
}

/// True for IPv4 and IPv6 literals (without brackets).
pub fn is_ip_literal(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}
