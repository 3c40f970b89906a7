//! Cipher models, configuration and the local SQLite vault.

pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AppConfig, CoreConfig, DedupConfig, LogConfig, MAX_DELETE_BATCH_SIZE};
pub use error::{ExitCode, Result, VaultError};
pub use models::*;

pub use storage::database::{ConnectionPool, Database, open_database, open_in_memory};
pub use storage::import::{ImportReport, import_export, parse_export};
pub use storage::repositories::{CipherRepository, Repository, SqliteCipherRepository};
