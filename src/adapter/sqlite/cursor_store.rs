//! SQLite event-cursor store implementation.

use diesel::prelude::*;

use super::connection::{checkout, map_db_error, DbPool};
use super::model::CursorRow;
use super::schema::event_cursors;
use crate::error::{Error, Result};
use crate::port::store::CursorStore;

/// SQLite-backed cursor store.
///
/// Cursors are monotonic-non-decreasing: a write at or below the stored value
/// is ignored, so a replayed batch can never rewind a listener.
pub struct SqliteCursorStore {
    pool: DbPool,
}

impl SqliteCursorStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CursorStore for SqliteCursorStore {
    async fn cursor(&self, network_key: &str, event_type: &str) -> Result<Option<u64>> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<CursorRow> = event_cursors::table
            .find((network_key, event_type))
            .first(&mut conn)
            .optional()
            .map_err(|e| map_db_error("get cursor", e))?;
        row.map(|r| {
            u64::try_from(r.last_block)
                .map_err(|_| Error::Parse(format!("negative cursor {}", r.last_block)))
        })
        .transpose()
    }

    async fn advance(&self, network_key: &str, event_type: &str, block: u64) -> Result<bool> {
        let block = i64::try_from(block)
            .map_err(|_| Error::Parse(format!("cursor block {block} overflows storage")))?;
        let mut conn = checkout(&self.pool)?;

        let moved = diesel::update(
            event_cursors::table
                .find((network_key, event_type))
                .filter(event_cursors::last_block.lt(block)),
        )
        .set(event_cursors::last_block.eq(block))
        .execute(&mut conn)
        .map_err(|e| map_db_error("advance cursor", e))?;
        if moved > 0 {
            return Ok(true);
        }

        // Either the row is missing (first observation) or the write is stale.
        let row = CursorRow {
            network_key: network_key.to_string(),
            event_type: event_type.to_string(),
            last_block: block,
        };
        let inserted = diesel::insert_or_ignore_into(event_cursors::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| map_db_error("seed cursor", e))?;
        Ok(inserted > 0)
    }
}
