use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::UriMatchStrategy;

/// Upper bound on ids per bulk delete call.
pub const MAX_DELETE_BATCH_SIZE: usize = 500;

/// Root application configuration, loaded from `~/.config/vaultsweep/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub dedup: DedupConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub vault_path: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub uri_strategy: UriMatchStrategy,
    pub delete_batch_size: usize,
    /// Cap on concurrent permission checks; unset means one per selected cipher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_check_concurrency: Option<usize>,
    /// TLDs of private DNS zones that must not collapse to `<label>.<tld>`.
    pub private_suffixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("vaultsweep");

        Self {
            vault_path: data_dir.join("vault.db").to_string_lossy().to_string(),
            user_id: "local".to_string(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            uri_strategy: UriMatchStrategy::Base,
            delete_batch_size: MAX_DELETE_BATCH_SIZE,
            permission_check_concurrency: None,
            private_suffixes: ["local", "internal", "lan", "corp", "home"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl DedupConfig {
    /// Batch size clamped to `1..=MAX_DELETE_BATCH_SIZE`.
    pub fn effective_batch_size(&self) -> usize {
        self.delete_batch_size.clamp(1, MAX_DELETE_BATCH_SIZE)
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/vaultsweep/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("VAULTSWEEP_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vaultsweep")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn set_vault_path(&mut self, path: PathBuf) {
        self.core.vault_path = path.to_string_lossy().to_string();
    }

    pub fn vault_path(&self) -> PathBuf {
        PathBuf::from(&self.core.vault_path)
    }

    /// Flattened `section.key = value` pairs for display.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let value = toml::Value::try_from(self)?;
        let mut entries = Vec::new();
        if let toml::Value::Table(sections) = value {
            for (section, body) in sections {
                if let toml::Value::Table(fields) = body {
                    for (key, field) in fields {
                        entries.push((format!("{section}.{key}"), render_value(&field)));
                    }
                }
            }
        }
        Ok(entries)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v))
    }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.dedup.uri_strategy, UriMatchStrategy::Base);
        assert_eq!(cfg.dedup.delete_batch_size, 500);
        assert_eq!(cfg.core.user_id, "local");
        assert!(cfg.dedup.private_suffixes.contains(&"internal".to_string()));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.dedup.uri_strategy = UriMatchStrategy::Exact;
        cfg.dedup.permission_check_concurrency = Some(8);
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.dedup.uri_strategy, UriMatchStrategy::Exact);
        assert_eq!(loaded.dedup.permission_check_concurrency, Some(8));
        assert_eq!(loaded.core.vault_path, cfg.core.vault_path);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dedup]\nuri_strategy = \"Hostname\"\n").unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.dedup.uri_strategy, UriMatchStrategy::Hostname);
        assert_eq!(cfg.dedup.delete_batch_size, 500);
        assert_eq!(cfg.log.level, "warn");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            AppConfig::load_from(Path::new("/tmp/nonexistent_vaultsweep_config.toml")).unwrap();
        assert_eq!(cfg.dedup.uri_strategy, UriMatchStrategy::Base);
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let mut cfg = DedupConfig::default();
        cfg.delete_batch_size = 10_000;
        assert_eq!(cfg.effective_batch_size(), 500);
        cfg.delete_batch_size = 0;
        assert_eq!(cfg.effective_batch_size(), 1);
    }

    #[test]
    fn test_get_flattened_key() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.get("dedup.uri_strategy").unwrap().as_deref(), Some("Base"));
        assert_eq!(cfg.get("nope.key").unwrap(), None);
    }
}
