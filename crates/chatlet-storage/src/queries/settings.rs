// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat settings persistence.

use std::collections::BTreeSet;
use std::str::FromStr;

use chatlet_core::{AccessMode, ChatId, ChatSettings, ChatletError, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::queries::conversion_error;

/// Insert or replace the settings row of a chat.
pub async fn put_settings(db: &Database, settings: &ChatSettings) -> Result<(), ChatletError> {
    let allowed: Vec<i64> = settings.allowed_users.iter().map(|u| u.0).collect();
    let allowed = serde_json::to_string(&allowed).map_err(ChatletError::storage)?;
    let settings = settings.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_settings (chat_id, creator_id, access_mode, allowed_users,
                                            created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (chat_id) DO UPDATE SET
                     creator_id    = excluded.creator_id,
                     access_mode   = excluded.access_mode,
                     allowed_users = excluded.allowed_users,
                     updated_at    = excluded.updated_at",
                params![
                    settings.chat_id.0,
                    settings.creator_id.0,
                    settings.access_mode.to_string(),
                    allowed,
                    settings.created_at,
                    settings.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get the settings row of a chat, if initialized.
pub async fn get_settings(db: &Database, chat_id: ChatId) -> Result<Option<ChatSettings>, ChatletError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT chat_id, creator_id, access_mode, allowed_users, created_at, updated_at
                 FROM chat_settings WHERE chat_id = ?1",
                params![chat_id.0],
                |row| {
                    let mode: String = row.get(2)?;
                    let access_mode =
                        AccessMode::from_str(&mode).map_err(|e| conversion_error(2, e))?;
                    let allowed: String = row.get(3)?;
                    let allowed: Vec<i64> =
                        serde_json::from_str(&allowed).map_err(|e| conversion_error(3, e))?;
                    Ok(ChatSettings {
                        chat_id: ChatId(row.get(0)?),
                        creator_id: UserId(row.get(1)?),
                        access_mode,
                        allowed_users: allowed.into_iter().map(UserId).collect::<BTreeSet<_>>(),
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
