// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use chatlet_config::model::StorageConfig;
use chatlet_core::{
    AdapterType, ChatId, ChatSettings, ChatletError, ExecutionLogEntry, HealthStatus,
    PluginAdapter, Script, ScriptSummary, StorageAdapter, UserRecord,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed script store.
///
/// The database is opened lazily by [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](StorageAdapter::initialize)
    /// is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database, e.g. an in-memory one.
    pub fn with_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open a migrated in-memory store.
    pub async fn in_memory() -> Result<Self, ChatletError> {
        let db = Database::open_in_memory().await?;
        Ok(Self::with_database(
            StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db,
        ))
    }

    /// Fetch a recorded user.
    pub async fn get_user(
        &self,
        user_id: chatlet_core::UserId,
    ) -> Result<Option<UserRecord>, ChatletError> {
        queries::users::get_user(self.db()?, user_id).await
    }

    fn db(&self) -> Result<&Database, ChatletError> {
        self.db.get().ok_or_else(|| ChatletError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatletError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatletError> {
        if let Some(db) = self.db.get()
            && self.config.wal_mode
        {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ChatletError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ChatletError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ChatletError> {
        let db = self.db()?;
        if self.config.wal_mode {
            db.checkpoint().await?;
        }
        Ok(())
    }

    // --- Scripts ---

    async fn put_script(&self, script: &Script) -> Result<(), ChatletError> {
        queries::scripts::put_script(self.db()?, script).await
    }

    async fn get_script(
        &self,
        chat_id: ChatId,
        command: &str,
    ) -> Result<Option<Script>, ChatletError> {
        queries::scripts::get_script(self.db()?, chat_id, command).await
    }

    async fn delete_script(&self, chat_id: ChatId, command: &str) -> Result<bool, ChatletError> {
        queries::scripts::delete_script(self.db()?, chat_id, command).await
    }

    async fn list_scripts(&self, chat_id: ChatId) -> Result<Vec<ScriptSummary>, ChatletError> {
        queries::scripts::list_scripts(self.db()?, chat_id).await
    }

    async fn list_all_scripts(&self) -> Result<Vec<Script>, ChatletError> {
        queries::scripts::list_all_scripts(self.db()?).await
    }

    // --- Chat settings ---

    async fn put_settings(&self, settings: &ChatSettings) -> Result<(), ChatletError> {
        queries::settings::put_settings(self.db()?, settings).await
    }

    async fn get_settings(&self, chat_id: ChatId) -> Result<Option<ChatSettings>, ChatletError> {
        queries::settings::get_settings(self.db()?, chat_id).await
    }

    // --- Users ---

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), ChatletError> {
        queries::users::upsert_user(self.db()?, user).await
    }

    // --- Execution log ---

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), ChatletError> {
        queries::execution_logs::append_log(self.db()?, entry).await
    }

    async fn recent_logs(
        &self,
        chat_id: ChatId,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, ChatletError> {
        queries::execution_logs::recent_logs(self.db()?, chat_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uninitialized_storage_reports_error() {
        let storage = SqliteStorage::new(StorageConfig::default());
        let err = storage.get_script(ChatId(1), "/x").await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn in_memory_storage_is_healthy() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn double_initialize_fails() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let err = storage.initialize().await.unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }
}
