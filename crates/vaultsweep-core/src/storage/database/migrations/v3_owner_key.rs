use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema;

pub struct V3OwnerKey;

impl Migration for V3OwnerKey {
    fn version(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "Key ciphers by owner and id"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        schema::rekey_ciphers_by_owner(conn)
    }
}
