// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for scripts, chat settings, users, and the execution log.
//!
//! All access goes through a single tokio-rusqlite connection, so writes are
//! serialized on its background thread. The schema is managed by embedded
//! refinery migrations.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;

/// Current time formatted the way every stored timestamp is.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
