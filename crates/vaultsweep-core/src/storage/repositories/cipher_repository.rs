use std::sync::MutexGuard;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::CipherView;

use super::Repository;

/// Cipher storage scoped to a single vault owner.
pub trait CipherRepository: Repository<Entity = CipherView, Id = str> {
    fn list(&self, include_deleted: bool) -> Result<Vec<CipherView>>;
    fn count(&self) -> Result<usize>;
    /// Moves ciphers to the trash. Already-trashed rows are left untouched.
    fn soft_delete_many(&self, ids: &[String]) -> Result<usize>;
    fn delete_many(&self, ids: &[String]) -> Result<usize>;
    fn restore_many(&self, ids: &[String]) -> Result<usize>;
}

pub struct SqliteCipherRepository<'a> {
    conn: MutexGuard<'a, Connection>,
    user_id: &'a str,
}

impl<'a> SqliteCipherRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>, user_id: &'a str) -> Self {
        Self { conn, user_id }
    }

    fn row_to_cipher(row: &rusqlite::Row) -> rusqlite::Result<(String, Option<String>)> {
        Ok((row.get(0)?, row.get(1)?))
    }

    /// The `deleted_date` column is authoritative over the payload copy.
    fn hydrate(payload: &str, deleted_date: Option<String>) -> Result<CipherView> {
        let mut cipher: CipherView = serde_json::from_str(payload)?;
        cipher.deleted_date = deleted_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(cipher)
    }

    /// Runs `sql` once per id inside one transaction. Binds `?1` user, `?2` id, `?3` now.
    fn update_each(&self, sql: &str, ids: &[String]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        let mut affected = 0usize;
        {
            let mut stmt = tx.prepare(sql)?;
            for id in ids {
                affected += stmt.execute(params![self.user_id, id, now])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }
}

impl<'a> Repository for SqliteCipherRepository<'a> {
    type Entity = CipherView;
    type Id = str;

    fn find_by_id(&self, id: &str) -> Result<Option<CipherView>> {
        let row = self
            .conn
            .query_row(
                "SELECT payload, deleted_date FROM ciphers WHERE user_id = ?1 AND id = ?2",
                params![self.user_id, id],
                Self::row_to_cipher,
            )
            .optional()?;

        row.map(|(payload, deleted)| Self::hydrate(&payload, deleted))
            .transpose()
    }

    fn save(&self, cipher: &CipherView) -> Result<()> {
        let payload = serde_json::to_string(cipher)?;
        let revision = cipher.revision_date.unwrap_or_else(Utc::now);

        // Upsert in place so the rowid, and with it the listing order, survives re-import.
        self.conn.execute(
            "INSERT INTO ciphers (id, user_id, name, cipher_type, payload, deleted_date, revision_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, id) DO UPDATE SET
                name = excluded.name,
                cipher_type = excluded.cipher_type,
                payload = excluded.payload,
                deleted_date = excluded.deleted_date,
                revision_date = excluded.revision_date",
            params![
                cipher.id,
                self.user_id,
                cipher.name.as_deref(),
                u8::from(cipher.cipher_type),
                payload,
                cipher.deleted_date.map(|d| d.to_rfc3339()),
                revision.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl<'a> CipherRepository for SqliteCipherRepository<'a> {
    fn list(&self, include_deleted: bool) -> Result<Vec<CipherView>> {
        let sql = if include_deleted {
            "SELECT payload, deleted_date FROM ciphers WHERE user_id = ?1 ORDER BY rowid"
        } else {
            "SELECT payload, deleted_date FROM ciphers
             WHERE user_id = ?1 AND deleted_date IS NULL ORDER BY rowid"
        };

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![self.user_id], Self::row_to_cipher)?;

        let mut ciphers = Vec::new();
        for row in rows {
            let (payload, deleted) = row?;
            ciphers.push(Self::hydrate(&payload, deleted)?);
        }
        Ok(ciphers)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ciphers WHERE user_id = ?1",
            params![self.user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn soft_delete_many(&self, ids: &[String]) -> Result<usize> {
        self.update_each(
            "UPDATE ciphers SET deleted_date = ?3, revision_date = ?3
             WHERE user_id = ?1 AND id = ?2 AND deleted_date IS NULL",
            ids,
        )
    }

    fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut affected = 0usize;
        {
            let mut stmt = tx.prepare("DELETE FROM ciphers WHERE user_id = ?1 AND id = ?2")?;
            for id in ids {
                affected += stmt.execute(params![self.user_id, id])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    fn restore_many(&self, ids: &[String]) -> Result<usize> {
        self.update_each(
            "UPDATE ciphers SET deleted_date = NULL, revision_date = ?3
             WHERE user_id = ?1 AND id = ?2 AND deleted_date IS NOT NULL",
            ids,
        )
    }
}
