// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable script store.

use async_trait::async_trait;

use crate::error::ChatletError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChatId, ChatSettings, ExecutionLogEntry, Script, ScriptSummary, UserRecord,
};

/// Adapter for durable storage of scripts, chat settings, users, and the execution log.
///
/// Every failure surfaces as [`ChatletError::Storage`]. Callers decide whether a
/// failure is fatal; the store itself never swallows one.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (connection, migrations).
    async fn initialize(&self) -> Result<(), ChatletError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ChatletError>;

    // --- Scripts ---

    /// Upserts a script keyed by `(chat_id, command)`.
    ///
    /// An existing row keeps its `created_at` and author; code, description,
    /// capabilities, and `updated_at` are replaced.
    async fn put_script(&self, script: &Script) -> Result<(), ChatletError>;

    async fn get_script(
        &self,
        chat_id: ChatId,
        command: &str,
    ) -> Result<Option<Script>, ChatletError>;

    /// Deletes a script. Returns whether a row was removed.
    async fn delete_script(&self, chat_id: ChatId, command: &str) -> Result<bool, ChatletError>;

    /// Lists a chat's scripts in command order.
    async fn list_scripts(&self, chat_id: ChatId) -> Result<Vec<ScriptSummary>, ChatletError>;

    /// Loads every script of every chat.
    async fn list_all_scripts(&self) -> Result<Vec<Script>, ChatletError>;

    // --- Chat settings ---

    async fn put_settings(&self, settings: &ChatSettings) -> Result<(), ChatletError>;

    async fn get_settings(&self, chat_id: ChatId) -> Result<Option<ChatSettings>, ChatletError>;

    // --- Users ---

    /// Inserts a user row; an existing row is left untouched.
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), ChatletError>;

    // --- Execution log ---

    async fn append_log(&self, entry: &ExecutionLogEntry) -> Result<(), ChatletError>;

    /// Most recent entries for a chat, newest first.
    async fn recent_logs(
        &self,
        chat_id: ChatId,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, ChatletError>;
}
