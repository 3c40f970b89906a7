use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// How strictly two URIs must agree to count as the same site.
///
/// The names are user-facing selector values and are matched case-sensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UriMatchStrategy {
    /// Registrable domain (`login.example.co.uk` → `example.co.uk`).
    #[default]
    Base,
    /// Full hostname, no reduction.
    Hostname,
    /// Hostname plus explicit port.
    Host,
    /// Scheme, host, port, path, query and fragment.
    Exact,
}

impl UriMatchStrategy {
    pub const ALL: [UriMatchStrategy; 4] = [Self::Base, Self::Hostname, Self::Host, Self::Exact];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "Base",
            Self::Hostname => "Hostname",
            Self::Host => "Host",
            Self::Exact => "Exact",
        }
    }
}

impl std::fmt::Display for UriMatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UriMatchStrategy {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Base" => Ok(Self::Base),
            "Hostname" => Ok(Self::Hostname),
            "Host" => Ok(Self::Host),
            "Exact" => Ok(Self::Exact),
            _ => Err(VaultError::UnknownStrategy(s.to_string())),
        }
    }
}
