use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 3;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ciphers (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            name          TEXT,
            cipher_type   INTEGER NOT NULL DEFAULT 1,
            payload       TEXT NOT NULL,
            deleted_date  TEXT,
            revision_date TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_ciphers_user    ON ciphers(user_id);
        CREATE INDEX IF NOT EXISTS idx_ciphers_deleted ON ciphers(user_id, deleted_date);
        ",
    )?;
    Ok(())
}

/// Rebuilds `ciphers` keyed by `(user_id, id)` so owners never share a row.
pub fn rekey_ciphers_by_owner(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE ciphers_by_owner (
            id            TEXT NOT NULL,
            user_id       TEXT NOT NULL,
            name          TEXT,
            cipher_type   INTEGER NOT NULL DEFAULT 1,
            payload       TEXT NOT NULL,
            deleted_date  TEXT,
            revision_date TEXT NOT NULL,
            PRIMARY KEY (user_id, id)
        );

        INSERT INTO ciphers_by_owner
            (id, user_id, name, cipher_type, payload, deleted_date, revision_date)
        SELECT id, user_id, name, cipher_type, payload, deleted_date, revision_date
        FROM ciphers
        ORDER BY rowid;

        DROP TABLE ciphers;
        ALTER TABLE ciphers_by_owner RENAME TO ciphers;
        ",
    )?;
    create_indexes(&tx)?;
    tx.commit()?;
    Ok(())
}
