// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Users who have submitted scripts.

use chatlet_core::{ChatletError, UserId, UserRecord};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

/// Record a user; an existing row is left as it is.
pub async fn upsert_user(db: &Database, user: &UserRecord) -> Result<(), ChatletError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, username, first_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id) DO NOTHING",
                params![user.user_id.0, user.username, user.first_name, user.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a user row.
pub async fn get_user(db: &Database, user_id: UserId) -> Result<Option<UserRecord>, ChatletError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, username, first_name, created_at FROM users WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok(UserRecord {
                        user_id: UserId(row.get(0)?),
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
