//! Collaborators backed by the local SQLite vault.

use async_trait::async_trait;
use tracing::debug;

use vaultsweep_core::{CipherView, Database};

use crate::collaborators::{CipherAuthorization, CipherStore};
use crate::error::Result;

#[async_trait]
impl CipherStore for Database {
    async fn get_all_decrypted(&self, user_id: &str) -> Result<Vec<CipherView>> {
        Ok(self.list_ciphers(user_id, true)?)
    }

    async fn soft_delete_many(&self, ids: &[String], user_id: &str) -> Result<()> {
        let changed = Database::soft_delete_many(self, user_id, ids)?;
        debug!("trashed {changed} of {} ciphers", ids.len());
        Ok(())
    }

    async fn delete_many(&self, ids: &[String], user_id: &str) -> Result<()> {
        let changed = Database::delete_many(self, user_id, ids)?;
        debug!("deleted {changed} of {} ciphers", ids.len());
        Ok(())
    }
}

/// Decides deletability from the flags stored on each cipher.
///
/// Personal ciphers are always deletable. Organization ciphers need the
/// `delete` permission, or `edit` when no permission block was synced.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCipherAuthorization;

impl LocalCipherAuthorization {
    pub fn allows(cipher: &CipherView) -> bool {
        if cipher.organization_id.is_none() {
            return true;
        }
        match cipher.permissions {
            Some(permissions) => permissions.delete,
            None => cipher.edit,
        }
    }
}

#[async_trait]
impl CipherAuthorization for LocalCipherAuthorization {
    async fn can_delete_cipher(&self, cipher: &CipherView) -> Result<bool> {
        Ok(Self::allows(cipher))
    }
}

#[cfg(test)]
mod tests {
    use vaultsweep_core::CipherPermissions;

    use super::*;

    const USER: &str = "local";

    fn org_cipher(permissions: Option<CipherPermissions>, edit: bool) -> CipherView {
        let mut cipher = CipherView::new("org-1", "Shared");
        cipher.organization_id = Some("org".to_string());
        cipher.permissions = permissions;
        cipher.edit = edit;
        cipher
    }

    #[test]
    fn personal_ciphers_are_deletable() {
        assert!(LocalCipherAuthorization::allows(&CipherView::new("1", "Mine")));
    }

    #[test]
    fn organization_ciphers_follow_permissions() {
        let deny = CipherPermissions { delete: false, restore: true };
        let allow = CipherPermissions { delete: true, restore: false };

        assert!(!LocalCipherAuthorization::allows(&org_cipher(Some(deny), true)));
        assert!(LocalCipherAuthorization::allows(&org_cipher(Some(allow), false)));
        assert!(LocalCipherAuthorization::allows(&org_cipher(None, true)));
        assert!(!LocalCipherAuthorization::allows(&org_cipher(None, false)));
    }

    #[tokio::test]
    async fn database_store_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_cipher(USER, &CipherView::login("a", "A", Some("u"), &["a.com"]))
            .unwrap();
        db.upsert_cipher(USER, &CipherView::login("b", "B", Some("u"), &["b.com"]))
            .unwrap();

        let store: &dyn CipherStore = &db;
        store.soft_delete_many(&["a".to_string()], USER).await.unwrap();

        let all = store.get_all_decrypted(USER).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().find(|c| c.id == "a").unwrap().is_deleted());

        store.delete_many(&["a".to_string()], USER).await.unwrap();
        let all = store.get_all_decrypted(USER).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "b");
    }
}
