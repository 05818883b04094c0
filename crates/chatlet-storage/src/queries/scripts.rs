// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Script CRUD operations.

use chatlet_core::{ChatId, ChatletError, Script, ScriptCapabilities, ScriptSummary, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::queries::conversion_error;

const SCRIPT_COLUMNS: &str = "chat_id, command, description, code, author, author_id, \
                              capabilities, created_at, updated_at";

fn script_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Script> {
    let capabilities: String = row.get(6)?;
    let capabilities: ScriptCapabilities =
        serde_json::from_str(&capabilities).map_err(|e| conversion_error(6, e))?;
    Ok(Script {
        chat_id: ChatId(row.get(0)?),
        command: row.get(1)?,
        description: row.get(2)?,
        code: row.get(3)?,
        author: row.get(4)?,
        author_id: UserId(row.get(5)?),
        capabilities,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert or update a script.
///
/// On conflict the original `created_at`, `author`, and `author_id` are kept.
pub async fn put_script(db: &Database, script: &Script) -> Result<(), ChatletError> {
    let capabilities = serde_json::to_string(&script.capabilities).map_err(ChatletError::storage)?;
    let script = script.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scripts (chat_id, command, description, code, author, author_id,
                                      capabilities, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (chat_id, command) DO UPDATE SET
                     description  = excluded.description,
                     code         = excluded.code,
                     capabilities = excluded.capabilities,
                     updated_at   = excluded.updated_at",
                params![
                    script.chat_id.0,
                    script.command,
                    script.description,
                    script.code,
                    script.author,
                    script.author_id.0,
                    capabilities,
                    script.created_at,
                    script.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a script by its key.
pub async fn get_script(
    db: &Database,
    chat_id: ChatId,
    command: &str,
) -> Result<Option<Script>, ChatletError> {
    let command = command.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE chat_id = ?1 AND command = ?2"),
                params![chat_id.0, command],
                script_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a script. Returns whether a row existed.
pub async fn delete_script(
    db: &Database,
    chat_id: ChatId,
    command: &str,
) -> Result<bool, ChatletError> {
    let command = command.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM scripts WHERE chat_id = ?1 AND command = ?2",
                params![chat_id.0, command],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// List a chat's scripts in command order.
pub async fn list_scripts(db: &Database, chat_id: ChatId) -> Result<Vec<ScriptSummary>, ChatletError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT command, description, author FROM scripts
                 WHERE chat_id = ?1 ORDER BY command",
            )?;
            let rows = stmt.query_map(params![chat_id.0], |row| {
                Ok(ScriptSummary {
                    command: row.get(0)?,
                    description: row.get(1)?,
                    author: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Load every stored script, ordered by chat and command.
pub async fn list_all_scripts(db: &Database) -> Result<Vec<Script>, ChatletError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCRIPT_COLUMNS} FROM scripts ORDER BY chat_id, command"
            ))?;
            let rows = stmt.query_map([], script_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
