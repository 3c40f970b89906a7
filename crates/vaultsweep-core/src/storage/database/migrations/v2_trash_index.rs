use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema;

pub struct V2TrashIndex;

impl Migration for V2TrashIndex {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Index ciphers by owner and trash state"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        schema::create_indexes(conn)?;
        Ok(())
    }
}
