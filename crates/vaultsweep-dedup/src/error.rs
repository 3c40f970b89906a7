use thiserror::Error;

use vaultsweep_core::VaultError;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("cipher store error: {0}")]
    Store(String),

    #[error("review error: {0}")]
    Review(String),

    #[error(transparent)]
    Core(#[from] VaultError),
}

pub type Result<T> = std::result::Result<T, DedupError>;
