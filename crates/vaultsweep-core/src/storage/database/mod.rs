mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use crate::error::{Result, VaultError};
use crate::models::CipherView;

use super::repositories::{CipherRepository, Repository, SqliteCipherRepository};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Local vault: decrypted ciphers per owner, with a trash.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn path(&self) -> Option<&str> {
        self.pool.path()
    }

    fn repo<'a>(&'a self, user_id: &'a str) -> SqliteCipherRepository<'a> {
        SqliteCipherRepository::new(self.pool.get_connection(), user_id)
    }

    pub fn upsert_cipher(&self, user_id: &str, cipher: &CipherView) -> Result<()> {
        if cipher.id.trim().is_empty() {
            return Err(VaultError::ValidationError(
                "cipher id must not be empty".to_string(),
            ));
        }
        self.repo(user_id).save(cipher)
    }

    pub fn get_cipher(&self, user_id: &str, id: &str) -> Result<CipherView> {
        self.repo(user_id)
            .find_by_id(id)?
            .ok_or_else(|| VaultError::CipherNotFound(id.to_string()))
    }

    /// All ciphers of `user_id` in insertion order, trashed ones included on request.
    pub fn list_ciphers(&self, user_id: &str, include_deleted: bool) -> Result<Vec<CipherView>> {
        self.repo(user_id).list(include_deleted)
    }

    pub fn count_ciphers(&self, user_id: &str) -> Result<usize> {
        self.repo(user_id).count()
    }

    pub fn soft_delete_many(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        self.repo(user_id).soft_delete_many(ids)
    }

    pub fn delete_many(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        self.repo(user_id).delete_many(ids)
    }

    pub fn restore_many(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        self.repo(user_id).restore_many(ids)
    }

    pub fn schema_versions(&self) -> Result<Vec<u32>> {
        let conn = self.pool.get_connection();
        get_applied_versions(&conn)
    }
}
