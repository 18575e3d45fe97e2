//! Persistence for NestChat: child profiles and conversation history.
//!
//! Both stores sit on one SQLite database. Only single-row reads and
//! writes occur; no multi-row transactions span the two stores, and
//! the system relies on SQLite's per-write atomicity. Stores are
//! constructed explicitly and injected at startup; tests hand them an
//! in-memory pool.

pub mod history;
pub mod profile;

pub use history::HistoryStore;
pub use profile::{NewProfile, ProfileStore, ProfileUpdate};

use nestchat_core::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Open (or create) the SQLite database behind both stores.
///
/// Pass `"sqlite::memory:"` for an in-process ephemeral database
/// (useful for tests).
pub async fn connect(url: &str) -> Result<SqlitePool, StoreError> {
    let in_memory = url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        .create_if_missing(true)
        .journal_mode(if in_memory {
            SqliteJournalMode::Memory
        } else {
            SqliteJournalMode::Wal
        })
        .synchronous(SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON");

    // An in-memory database exists per connection, so the pool must
    // hold exactly one and never recycle it.
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };

    pool_options
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))
}
