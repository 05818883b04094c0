// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use chatlet_core::ChatletError;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into `ChatletError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ChatletError {
    ChatletError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection used by the store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database file, apply PRAGMAs, and migrate.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, ChatletError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(ChatletError::storage)?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| ChatletError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, ChatletError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| ChatletError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    /// Returns the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ChatletError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), ChatletError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;
                     PRAGMA synchronous = NORMAL;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        let applied = self
            .conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e: tokio_rusqlite::Error<refinery::Error>| ChatletError::Storage {
                source: e.to_string().into(),
            })?;
        if applied > 0 {
            info!(applied, "database migrations applied");
        }
        Ok(())
    }
}
