//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, embedded migrations, and the shared mapping
//! from Diesel errors onto the crate error kinds.

use diesel::prelude::*;
use diesel::r2d2;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::DatabaseErrorKind;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{Error, Result};

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Create a connection pool for the given database URL.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(5)
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    diesel::sql_query("PRAGMA busy_timeout=5000")
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Connection(e.to_string()))?;
    Ok(())
}

/// Checkout a pooled connection.
pub(crate) fn checkout(pool: &DbPool) -> Result<r2d2::PooledConnection<ConnectionManager<SqliteConnection>>> {
    pool.get().map_err(|e| Error::Connection(e.to_string()))
}

/// Map Diesel errors onto crate kinds; unique violations become
/// [`Error::DuplicateKey`] so callers can recover by re-reading.
pub(crate) fn map_db_error(context: &str, error: diesel::result::Error) -> Error {
    match error {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            Error::DuplicateKey(format!("{context}: {}", info.message()))
        }
        other => Error::Database(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_with_memory_db() {
        assert!(create_pool(":memory:").is_ok());
    }

    #[test]
    fn run_migrations_creates_tables() {
        let pool = create_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        let tables: Vec<String> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' \
             AND name != '__diesel_schema_migrations' ORDER BY name",
        )
        .load::<TableName>(&mut conn)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();

        assert!(tables.contains(&"markets".to_string()));
        assert!(tables.contains(&"pricing_cache".to_string()));
        assert!(tables.contains(&"arbitrage".to_string()));
        assert!(tables.contains(&"event_cursors".to_string()));
        assert!(tables.contains(&"players".to_string()));
        assert!(tables.contains(&"market_creation_attempts".to_string()));
    }

    #[derive(diesel::QueryableByName)]
    struct TableName {
        #[diesel(sql_type = diesel::sql_types::Text)]
        name: String,
    }

    #[test]
    fn run_migrations_is_idempotent() {
        let pool = create_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();
    }
}
