// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only execution audit log.

use std::str::FromStr;

use chatlet_core::{ChatId, ChatletError, ExecutionKind, ExecutionLogEntry, UserId};
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::queries::conversion_error;

/// Append one execution record.
pub async fn append_log(db: &Database, entry: &ExecutionLogEntry) -> Result<(), ChatletError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO execution_logs (chat_id, user_id, command, kind, success,
                                             error_message, executed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.chat_id.0,
                    entry.user_id.0,
                    entry.command,
                    entry.kind.to_string(),
                    entry.success,
                    entry.error_message,
                    entry.executed_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The latest `limit` entries of a chat, newest first.
pub async fn recent_logs(
    db: &Database,
    chat_id: ChatId,
    limit: usize,
) -> Result<Vec<ExecutionLogEntry>, ChatletError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT chat_id, user_id, command, kind, success, error_message, executed_at
                 FROM execution_logs WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![chat_id.0, limit], |row| {
                let kind: String = row.get(3)?;
                Ok(ExecutionLogEntry {
                    chat_id: ChatId(row.get(0)?),
                    user_id: UserId(row.get(1)?),
                    command: row.get(2)?,
                    kind: ExecutionKind::from_str(&kind).map_err(|e| conversion_error(3, e))?,
                    success: row.get(4)?,
                    error_message: row.get(5)?,
                    executed_at: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
