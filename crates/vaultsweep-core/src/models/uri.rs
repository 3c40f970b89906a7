use serde::{Deserialize, Deserializer, Serialize};

/// A stored login URI. Exports and older clients carry either a bare string
/// or an object exposing one of `uri`, `decryptedValue` or `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UriValue {
    Plain(String),
    Structured(UriFields),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UriFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl UriValue {
    /// The usable URI string, if any. Structured values are checked in the
    /// order `uri`, `decrypted_value`, `text`; blank strings are skipped.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Plain(s) => non_blank(s),
            Self::Structured(fields) => fields
                .uri
                .as_deref()
                .and_then(non_blank)
                .or_else(|| fields.decrypted_value.as_deref().and_then(non_blank))
                .or_else(|| fields.text.as_deref().and_then(non_blank)),
        }
    }
}

impl From<&str> for UriValue {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub(crate) fn nullable_uris<'de, D>(deserializer: D) -> Result<Vec<UriValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let uris: Option<Vec<Option<UriValue>>> = Option::deserialize(deserializer)?;
    Ok(uris.unwrap_or_default().into_iter().flatten().collect())
}
