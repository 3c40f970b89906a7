use async_trait::async_trait;

use vaultsweep_core::CipherView;

use crate::error::Result;
use crate::finder::DuplicateSet;
use crate::review::ReviewDecision;

/// Source of decrypted ciphers and sink for deletions.
#[async_trait]
pub trait CipherStore: Send + Sync {
    async fn get_all_decrypted(&self, user_id: &str) -> Result<Vec<CipherView>>;

    /// Moves `ids` to the trash. Called with at most one batch of ids.
    async fn soft_delete_many(&self, ids: &[String], user_id: &str) -> Result<()>;

    /// Permanently deletes `ids`. Called with at most one batch of ids.
    async fn delete_many(&self, ids: &[String], user_id: &str) -> Result<()>;
}

#[async_trait]
pub trait CipherAuthorization: Send + Sync {
    async fn can_delete_cipher(&self, cipher: &CipherView) -> Result<bool>;
}

/// Presents duplicate sets to someone who decides what goes.
///
/// `None` means the review was dismissed.
#[async_trait]
pub trait DuplicateReviewer: Send + Sync {
    async fn review(&self, sets: &[DuplicateSet]) -> Result<Option<ReviewDecision>>;
}
