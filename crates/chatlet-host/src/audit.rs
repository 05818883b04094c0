// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort execution audit trail.

use std::sync::Arc;

use chatlet_core::{ChatId, ExecutionKind, ExecutionLogEntry, StorageAdapter, UserId};
use tracing::warn;

use crate::now_timestamp;

/// Cut `message` to at most `limit` characters, marking the cut with `...`.
pub fn truncate_message(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// Appends execution records. Storage failures are logged and swallowed.
pub struct AuditSink {
    store: Arc<dyn StorageAdapter + Send + Sync>,
    error_limit: usize,
}

impl AuditSink {
    pub fn new(store: Arc<dyn StorageAdapter + Send + Sync>, error_limit: usize) -> Self {
        Self { store, error_limit }
    }

    pub fn error_limit(&self) -> usize {
        self.error_limit
    }

    pub async fn record_success(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        command: &str,
        kind: ExecutionKind,
    ) {
        self.record(chat_id, user_id, command, kind, None).await;
    }

    pub async fn record_failure(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        command: &str,
        kind: ExecutionKind,
        error: &str,
    ) {
        self.record(chat_id, user_id, command, kind, Some(error))
            .await;
    }

    async fn record(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        command: &str,
        kind: ExecutionKind,
        error: Option<&str>,
    ) {
        let entry = ExecutionLogEntry {
            chat_id,
            user_id,
            command: command.to_string(),
            kind,
            success: error.is_none(),
            error_message: error.map(|e| truncate_message(e, self.error_limit)),
            executed_at: now_timestamp(),
        };
        if let Err(e) = self.store.append_log(&entry).await {
            warn!(
                chat_id = %chat_id,
                command,
                error = %e,
                "failed to append execution log"
            );
        }
    }
}
