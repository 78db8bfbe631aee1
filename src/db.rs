//! Database module
//!
//! Persists each conversation's dialog stack as JSON, keyed the way the bot
//! SDK keys conversation state.

mod schema;

use schema::SCHEMA;

use crate::dialog::DialogState;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// State key for a conversation: `{channel_id}/conversations/{conversation_id}`
pub fn conversation_state_key(channel_id: &str, conversation_id: &str) -> String {
    format!("{channel_id}/conversations/{conversation_id}")
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database. State is lost on restart.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Lock the connection, recovering it from a poisoned lock
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== State Operations ====================

    /// Load a conversation's state. Rows that no longer parse are treated
    /// as a fresh conversation.
    pub fn get_state(&self, key: &str) -> DbResult<Option<DialogState>> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT state FROM conversation_state WHERE state_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(json) = json else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding unreadable conversation state");
                Ok(None)
            }
        }
    }

    /// Insert or replace a conversation's state
    pub fn put_state(&self, key: &str, state: &DialogState) -> DbResult<()> {
        let json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();

        self.conn().execute(
            "INSERT INTO conversation_state (state_key, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(state_key) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![key, json, now],
        )?;
        Ok(())
    }

    /// Forget a conversation. Returns whether a row existed.
    #[allow(dead_code)] // Store maintenance, exercised in tests
    pub fn delete_state(&self, key: &str) -> DbResult<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM conversation_state WHERE state_key = ?1",
            params![key],
        )?;
        Ok(deleted > 0)
    }

    /// Number of stored conversations
    pub fn count_states(&self) -> DbResult<u64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM conversation_state", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
