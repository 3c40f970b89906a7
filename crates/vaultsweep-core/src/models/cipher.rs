use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UriValue;

/// Item kind, stored as its numeric wire value (`1` = login, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CipherType {
    #[default]
    Login,
    SecureNote,
    Card,
    Identity,
    SshKey,
}

impl TryFrom<u8> for CipherType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Login),
            2 => Ok(Self::SecureNote),
            3 => Ok(Self::Card),
            4 => Ok(Self::Identity),
            5 => Ok(Self::SshKey),
            other => Err(format!("Invalid cipher type: {other}")),
        }
    }
}

impl From<CipherType> for u8 {
    fn from(value: CipherType) -> Self {
        match value {
            CipherType::Login => 1,
            CipherType::SecureNote => 2,
            CipherType::Card => 3,
            CipherType::Identity => 4,
            CipherType::SshKey => 5,
        }
    }
}

impl std::fmt::Display for CipherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::SecureNote => write!(f, "note"),
            Self::Card => write!(f, "card"),
            Self::Identity => write!(f, "identity"),
            Self::SshKey => write!(f, "ssh-key"),
        }
    }
}

/// Master-password reprompt setting (`0` = none, `1` = password).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CipherRepromptType {
    #[default]
    None,
    Password,
}

impl TryFrom<u8> for CipherRepromptType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Password),
            other => Err(format!("Invalid reprompt type: {other}")),
        }
    }
}

impl From<CipherRepromptType> for u8 {
    fn from(value: CipherRepromptType) -> Self {
        match value {
            CipherRepromptType::None => 0,
            CipherRepromptType::Password => 1,
        }
    }
}

/// Organization-granted permissions on a shared cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherPermissions {
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub restore: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "super::uri::nullable_uris")]
    pub uris: Vec<UriValue>,
}

/// A decrypted vault item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherView {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub cipher_type: CipherType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginView>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub reprompt: CipherRepromptType,

    #[serde(default = "default_edit")]
    pub edit: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<CipherPermissions>,
}

fn default_edit() -> bool {
    true
}

impl CipherView {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            cipher_type: CipherType::Login,
            login: None,
            organization_id: None,
            deleted_date: None,
            revision_date: Some(Utc::now()),
            reprompt: CipherRepromptType::None,
            edit: true,
            permissions: None,
        }
    }

    /// Builds a login cipher with the given username and plain URIs.
    pub fn login(
        id: impl Into<String>,
        name: impl Into<String>,
        username: Option<&str>,
        uris: &[&str],
    ) -> Self {
        let mut cipher = Self::new(id, name);
        cipher.login = Some(LoginView {
            username: username.map(str::to_string),
            uris: uris.iter().map(|u| UriValue::Plain((*u).to_string())).collect(),
        });
        cipher
    }

    /// Soft-deleted ciphers live in the trash until permanently removed.
    pub fn is_deleted(&self) -> bool {
        self.deleted_date.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.login.as_ref().and_then(|l| l.username.as_deref())
    }

    pub fn uris(&self) -> &[UriValue] {
        self.login.as_ref().map(|l| l.uris.as_slice()).unwrap_or_default()
    }

    /// Non-empty URI strings in stored order.
    pub fn uri_strings(&self) -> Vec<&str> {
        self.uris().iter().filter_map(UriValue::as_str).collect()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_type_wire_values() {
        assert_eq!(u8::from(CipherType::Login), 1);
        assert_eq!(CipherType::try_from(2).unwrap(), CipherType::SecureNote);
        assert!(CipherType::try_from(9).is_err());
    }

    #[test]
    fn test_deserialize_export_item() {
        let json = r#"{
            "id": "c1",
            "organizationId": null,
            "type": 1,
            "reprompt": 0,
            "name": "GitHub",
            "favorite": false,
            "login": {
                "username": "octo",
                "password": "hunter2",
                "uris": [{"match": null, "uri": "https://github.com/login"}, "github.com"]
            },
            "deletedDate": "2024-01-02T03:04:05Z"
        }"#;

        let cipher: CipherView = serde_json::from_str(json).unwrap();
        assert_eq!(cipher.username(), Some("octo"));
        assert_eq!(
            cipher.uri_strings(),
            vec!["https://github.com/login", "github.com"]
        );
        assert!(cipher.is_deleted());
        assert!(cipher.edit);
    }

    #[test]
    fn test_null_uris_become_empty() {
        let json = r#"{"id": "c2", "type": 1, "login": {"username": "u", "uris": null}}"#;
        let cipher: CipherView = serde_json::from_str(json).unwrap();
        assert!(cipher.uris().is_empty());
        assert_eq!(cipher.display_name(), "");
    }
}
