use serde::{Deserialize, Serialize};

/// Maximum number of example values kept per warning category.
pub const WARNING_SAMPLE_LIMIT: usize = 10;

/// Non-fatal findings of one detection run, ready for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateOperationWarnings {
    pub unparseable_uri_count: usize,
    pub unparseable_uri_samples: Vec<String>,
    pub exact_fallback_count: usize,
    pub exact_fallback_samples: Vec<String>,
    pub permission_denied_count: usize,
    pub permission_denied_names: Vec<String>,
}

impl DuplicateOperationWarnings {
    pub fn is_empty(&self) -> bool {
        self.unparseable_uri_count == 0
            && self.exact_fallback_count == 0
            && self.permission_denied_count == 0
    }
}

/// Mutable counters threaded through one detection run.
#[derive(Debug, Clone, Default)]
pub struct WarningAccumulator {
    inner: DuplicateOperationWarnings,
}

impl WarningAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unparseable(&mut self, uri: &str) {
        self.inner.unparseable_uri_count += 1;
        push_sample(&mut self.inner.unparseable_uri_samples, uri);
    }

    pub fn record_exact_fallback(&mut self, uri: &str) {
        self.inner.exact_fallback_count += 1;
        push_sample(&mut self.inner.exact_fallback_samples, uri);
    }

    pub fn record_permission_denied(&mut self, name: &str) {
        self.inner.permission_denied_count += 1;
        push_sample(&mut self.inner.permission_denied_names, name);
    }

    pub fn finish(self) -> DuplicateOperationWarnings {
        self.inner
    }
}

fn push_sample(samples: &mut Vec<String>, value: &str) {
    if samples.len() < WARNING_SAMPLE_LIMIT {
        samples.push(value.to_string());
    }
}
