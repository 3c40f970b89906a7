//! Plaintext JSON vault exports: `{ "encrypted": false, "items": [...] }` or a bare array.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::models::CipherView;
use crate::storage::database::Database;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Parses an export document into ciphers. Items without an id get a fresh UUID.
pub fn parse_export(contents: &str) -> Result<Vec<CipherView>> {
    let document: Value = serde_json::from_str(contents)?;

    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut root) => {
            if root.get("encrypted").and_then(Value::as_bool) == Some(true) {
                return Err(VaultError::ImportError(
                    "encrypted exports are not supported".to_string(),
                ));
            }
            match root.remove("items") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(VaultError::ImportError(
                        "`items` must be an array".to_string(),
                    ));
                }
                None => Vec::new(),
            }
        }
        _ => {
            return Err(VaultError::ImportError(
                "expected an object or an array".to_string(),
            ));
        }
    };

    let mut ciphers = Vec::with_capacity(items.len());
    for mut item in items {
        if let Value::Object(fields) = &mut item {
            let missing_id = fields
                .get("id")
                .and_then(Value::as_str)
                .is_none_or(|id| id.trim().is_empty());
            if missing_id {
                fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }
        }
        ciphers.push(serde_json::from_value(item)?);
    }
    Ok(ciphers)
}

pub fn import_export(db: &Database, user_id: &str, path: &Path) -> Result<ImportReport> {
    let contents = std::fs::read_to_string(path)?;
    let ciphers = parse_export(&contents)?;

    let mut report = ImportReport::default();
    for cipher in &ciphers {
        match db.upsert_cipher(user_id, cipher) {
            Ok(()) => report.imported += 1,
            Err(VaultError::ValidationError(msg)) => {
                tracing::warn!("skipping cipher {}: {msg}", cipher.id);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "imported {} ciphers from {} ({} skipped)",
        report.imported,
        path.display(),
        report.skipped
    );
    Ok(report)
}
