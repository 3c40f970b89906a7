use std::collections::HashSet;
use std::sync::Arc;

use vaultsweep_core::{DedupConfig, UriMatchStrategy};

use crate::domain::{DomainResolver, PslDomainResolver, is_ip_literal};
use crate::uri::{self, ParsedUri, ParseFidelity, UriKind, WebLocation};
use crate::warnings::WarningAccumulator;

/// Computes grouping keys for login URIs under a matching strategy.
#[derive(Clone)]
pub struct KeyExtractor {
    resolver: Arc<dyn DomainResolver>,
    private_suffixes: HashSet<String>,
}

impl Default for KeyExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(PslDomainResolver),
            DedupConfig::default().private_suffixes,
        )
    }
}

impl std::fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExtractor")
            .field("private_suffixes", &self.private_suffixes)
            .finish_non_exhaustive()
    }
}

impl KeyExtractor {
    pub fn new<I, S>(resolver: Arc<dyn DomainResolver>, private_suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resolver,
            private_suffixes: private_suffixes
                .into_iter()
                .map(|s| s.into().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(Arc::new(PslDomainResolver), config.private_suffixes.clone())
    }

    /// Distinct keys for `uris`, in first-seen order. Unparseable URIs are
    /// counted in `warnings` and contribute nothing.
    pub fn keys_for<'a, I>(
        &self,
        uris: I,
        strategy: UriMatchStrategy,
        warnings: &mut WarningAccumulator,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        for raw in uris {
            let Some(parsed) = uri::parse(raw) else {
                continue;
            };
            if let Some(key) = self.key_for(&parsed, strategy, warnings)
                && seen.insert(key.clone())
            {
                keys.push(key);
            }
        }

        keys
    }

    pub fn key_for(
        &self,
        parsed: &ParsedUri,
        strategy: UriMatchStrategy,
        warnings: &mut WarningAccumulator,
    ) -> Option<String> {
        let location = match &parsed.kind {
            UriKind::Unparseable => {
                warnings.record_unparseable(&parsed.original);
                return None;
            }
            UriKind::AndroidApp { package } => {
                return Some(match strategy {
                    UriMatchStrategy::Exact => format!("androidapp:{package}"),
                    _ => package.clone(),
                });
            }
            UriKind::Web(location) => location,
        };

        let key = match strategy {
            UriMatchStrategy::Base => self.base_key(location),
            UriMatchStrategy::Hostname => location.host.clone(),
            UriMatchStrategy::Host => host_with_port(location),
            UriMatchStrategy::Exact => {
                if location.fidelity == ParseFidelity::Approximate {
                    warnings.record_exact_fallback(&parsed.original);
                }
                exact_key(location)
            }
        };
        Some(key)
    }

    fn base_key(&self, location: &WebLocation) -> String {
        let host = &location.host;
        if is_ip_literal(host) {
            return host.clone();
        }

        let Some(domain) = self
            .resolver
            .get_domain(&format!("{}://{}", location.scheme, host))
            .map(|d| d.to_lowercase())
        else {
            return host.clone();
        };

        // `a.b.internal` must not collapse to `b.internal`.
        let domain_labels = domain.split('.').count();
        let host_labels = host.split('.').count();
        let tld = domain.rsplit('.').next().unwrap_or_default();
        if domain_labels == 2 && host_labels > 2 && self.private_suffixes.contains(tld) {
            return host.clone();
        }

        domain
    }
}

fn host_with_port(location: &WebLocation) -> String {
    match &location.port {
        Some(port) => format!("{}:{}", location.host, port),
        None => location.host.clone(),
    }
}

fn exact_key(location: &WebLocation) -> String {
    let mut key = format!("{}://{}", location.scheme, host_with_port(location));
    key.push_str(&location.path);
    if let Some(query) = &location.query {
        key.push('?');
        key.push_str(query);
    }
    if let Some(fragment) = &location.fragment {
        key.push('#');
        key.push_str(fragment);
    }
    key.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::WARNING_SAMPLE_LIMIT;

    fn keys(uris: &[&str], strategy: UriMatchStrategy) -> Vec<String> {
        let mut warnings = WarningAccumulator::new();
        KeyExtractor::default().keys_for(uris.iter().copied(), strategy, &mut warnings)
    }

    #[test]
    fn base_collapses_to_registrable_domain() {
        assert_eq!(
            keys(&["https://a.b.example.co.uk/x"], UriMatchStrategy::Base),
            vec!["example.co.uk"]
        );
        assert_eq!(keys(&["example.co.uk"], UriMatchStrategy::Base), vec!["example.co.uk"]);
    }

    #[test]
    fn base_keeps_ip_literals() {
        assert_eq!(keys(&["http://192.168.0.10:8080/"], UriMatchStrategy::Base), vec!["192.168.0.10"]);
        assert_eq!(keys(&["https://[::1]/"], UriMatchStrategy::Base), vec!["::1"]);
    }

    #[test]
    fn base_guards_private_zones() {
        assert_eq!(
            keys(&["https://grafana.monitoring.svc.cluster.local"], UriMatchStrategy::Base),
            vec!["grafana.monitoring.svc.cluster.local"]
        );
        assert_eq!(keys(&["https://a.b.internal/"], UriMatchStrategy::Base), vec!["a.b.internal"]);
        // Two-label hosts are already as short as they get.
        assert_eq!(keys(&["https://nas.lan"], UriMatchStrategy::Base), vec!["nas.lan"]);
    }

    #[test]
    fn base_guard_ignores_public_tlds() {
        assert_eq!(keys(&["https://a.b.example.com"], UriMatchStrategy::Base), vec!["example.com"]);
    }

    #[test]
    fn base_miss_returns_full_host() {
        assert_eq!(keys(&["http://intranet:3000"], UriMatchStrategy::Base), vec!["intranet"]);
        assert_eq!(keys(&["http://localhost:3000"], UriMatchStrategy::Base), vec!["localhost"]);
    }

    #[test]
    fn hostname_and_host() {
        let uri = "https://Login.Example.com:8443/path";
        assert_eq!(keys(&[uri], UriMatchStrategy::Hostname), vec!["login.example.com"]);
        assert_eq!(keys(&[uri], UriMatchStrategy::Host), vec!["login.example.com:8443"]);
        assert_eq!(
            keys(&["https://[2001:db8::1]:8080"], UriMatchStrategy::Host),
            vec!["2001:db8::1:8080"]
        );
    }

    #[test]
    fn exact_reconstructs_full_uri() {
        assert_eq!(
            keys(&["HTTPS://Example.com:8443/Login?Next=%2F#Top"], UriMatchStrategy::Exact),
            vec!["https://example.com:8443/login?next=%2f#top"]
        );
    }

    #[test]
    fn android_keys_per_strategy() {
        for strategy in [UriMatchStrategy::Base, UriMatchStrategy::Hostname, UriMatchStrategy::Host] {
            assert_eq!(keys(&["androidapp://com.pkg/path"], strategy), vec!["com.pkg"]);
        }
        assert_eq!(
            keys(&["androidapp:com.pkg?x=1"], UriMatchStrategy::Exact),
            vec!["androidapp:com.pkg"]
        );
    }

    #[test]
    fn path_query_fragment_only_matter_for_exact() {
        let a = "https://example.com/login";
        let b = "https://example.com/login?x=1#f";
        for strategy in [UriMatchStrategy::Base, UriMatchStrategy::Hostname, UriMatchStrategy::Host] {
            assert_eq!(keys(&[a], strategy), keys(&[b], strategy));
        }
        assert_ne!(keys(&[a], UriMatchStrategy::Exact), keys(&[b], UriMatchStrategy::Exact));
    }

    #[test]
    fn keys_are_deduplicated_and_stable() {
        let uris = ["https://example.com/a", "http://www.example.com", "example.com"];
        let first = keys(&uris, UriMatchStrategy::Base);
        assert_eq!(first, vec!["example.com"]);
        assert_eq!(first, keys(&uris, UriMatchStrategy::Base));
    }

    #[test]
    fn unparseable_and_fallback_warnings() {
        let mut warnings = WarningAccumulator::new();
        let extractor = KeyExtractor::default();

        let got = extractor.keys_for(
            ["http://", "https://exa mple.com/x", "   "],
            UriMatchStrategy::Exact,
            &mut warnings,
        );
        assert_eq!(got, vec!["https://exa mple.com/x"]);

        let warnings = warnings.finish();
        assert_eq!(warnings.unparseable_uri_count, 1);
        assert_eq!(warnings.unparseable_uri_samples, vec!["http://"]);
        assert_eq!(warnings.exact_fallback_count, 1);
        assert_eq!(warnings.exact_fallback_samples, vec!["https://exa mple.com/x"]);
    }

    #[test]
    fn exact_fallback_count_is_exact_and_samples_capped() {
        let uris: Vec<String> = (0..25)
            .map(|i| format!("https://exa mple{i}.com/x"))
            .collect();
        let mut warnings = WarningAccumulator::new();
        let got = KeyExtractor::default().keys_for(
            uris.iter().map(String::as_str),
            UriMatchStrategy::Exact,
            &mut warnings,
        );
        assert_eq!(got.len(), 25);

        let warnings = warnings.finish();
        assert_eq!(warnings.exact_fallback_count, 25);
        assert_eq!(warnings.exact_fallback_samples.len(), WARNING_SAMPLE_LIMIT);
        assert_eq!(warnings.exact_fallback_samples, uris[..WARNING_SAMPLE_LIMIT].to_vec());
    }

    #[test]
    fn approximate_parse_only_warns_under_exact() {
        let mut warnings = WarningAccumulator::new();
        KeyExtractor::default().keys_for(
            ["https://exa mple.com/x"],
            UriMatchStrategy::Hostname,
            &mut warnings,
        );
        assert_eq!(warnings.finish().exact_fallback_count, 0);
    }

    struct NoDomains;

    impl DomainResolver for NoDomains {
        fn get_domain(&self, _url: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn custom_resolver_and_suffixes() {
        let extractor = KeyExtractor::new(Arc::new(NoDomains), ["corp"]);
        let mut warnings = WarningAccumulator::new();
        assert_eq!(
            extractor.keys_for(["https://a.b.example.com"], UriMatchStrategy::Base, &mut warnings),
            vec!["a.b.example.com"]
        );
    }
}
