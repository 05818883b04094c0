// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatlet scripts`, `chatlet logs` and `chatlet check-config`.
//!
//! Read-only views over the store and the effective configuration. Output is
//! a plain table, colored on a TTY, or JSON with `--json`.

use std::io::IsTerminal;

use chatlet_config::model::ChatletConfig;
use chatlet_core::{ChatId, ChatletError, ExecutionLogEntry, StorageAdapter};
use chatlet_storage::SqliteStorage;
use colored::Colorize;
use serde::Serialize;

/// One line of `chatlet scripts` output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ScriptRow {
    pub chat_id: i64,
    pub command: String,
    pub description: String,
    pub author: String,
}

async fn open_storage(config: &ChatletConfig) -> Result<SqliteStorage, ChatletError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(storage)
}

fn use_color(plain: bool) -> bool {
    !plain && std::io::stdout().is_terminal()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
    );
}

/// Scripts of one chat, or of every chat ordered by chat and command.
pub async fn collect_scripts(
    store: &dyn StorageAdapter,
    chat_id: Option<i64>,
) -> Result<Vec<ScriptRow>, ChatletError> {
    Ok(match chat_id {
        Some(id) => store
            .list_scripts(ChatId(id))
            .await?
            .into_iter()
            .map(|s| ScriptRow {
                chat_id: id,
                command: s.command,
                description: s.description,
                author: s.author,
            })
            .collect(),
        None => {
            let mut rows: Vec<ScriptRow> = store
                .list_all_scripts()
                .await?
                .into_iter()
                .map(|s| ScriptRow {
                    chat_id: s.chat_id.0,
                    command: s.command,
                    description: s.description,
                    author: s.author,
                })
                .collect();
            rows.sort_by(|a, b| (a.chat_id, &a.command).cmp(&(b.chat_id, &b.command)));
            rows
        }
    })
}

pub fn render_scripts(rows: &[ScriptRow], color: bool) -> String {
    if rows.is_empty() {
        return "  no scripts stored\n".to_string();
    }
    let mut out = String::new();
    let mut current = None;
    for row in rows {
        if current != Some(row.chat_id) {
            current = Some(row.chat_id);
            let title = format!("chat {}", row.chat_id);
            if color {
                out.push_str(&format!("\n  {}\n", title.bold()));
            } else {
                out.push_str(&format!("\n  {title}\n"));
            }
        }
        let command = if color {
            row.command.cyan().to_string()
        } else {
            row.command.clone()
        };
        out.push_str(&format!(
            "    {command} - {} ({})\n",
            row.description, row.author
        ));
    }
    out
}

pub fn render_logs(entries: &[ExecutionLogEntry], color: bool) -> String {
    if entries.is_empty() {
        return "  no executions recorded\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let status = match (entry.success, color) {
            (true, true) => "ok".green().to_string(),
            (false, true) => "FAIL".red().to_string(),
            (true, false) => "[OK]".to_string(),
            (false, false) => "[FAIL]".to_string(),
        };
        out.push_str(&format!(
            "  {}  {status}  {:<8} {} user={}\n",
            entry.executed_at, entry.kind, entry.command, entry.user_id
        ));
        if let Some(msg) = &entry.error_message {
            out.push_str(&format!("      {msg}\n"));
        }
    }
    out
}

/// Run `chatlet scripts [chat_id]`.
pub async fn run_scripts(
    config: &ChatletConfig,
    chat_id: Option<i64>,
    json: bool,
    plain: bool,
) -> Result<(), ChatletError> {
    let storage = open_storage(config).await?;
    let rows = collect_scripts(&storage, chat_id).await?;
    if json {
        print_json(&rows);
    } else {
        print!("{}", render_scripts(&rows, use_color(plain)));
    }
    storage.close().await
}

/// Run `chatlet logs <chat_id>`.
pub async fn run_logs(
    config: &ChatletConfig,
    chat_id: i64,
    limit: usize,
    json: bool,
    plain: bool,
) -> Result<(), ChatletError> {
    let storage = open_storage(config).await?;
    let entries = storage.recent_logs(ChatId(chat_id), limit).await?;
    if json {
        print_json(&entries);
    } else {
        print!("{}", render_logs(&entries, use_color(plain)));
    }
    storage.close().await
}

/// Human-readable digest of the effective configuration.
pub fn config_summary(config: &ChatletConfig) -> String {
    let token = if config
        .telegram
        .bot_token
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty())
    {
        "set"
    } else {
        "missing (required by `chatlet serve`)"
    };
    let timeout = config
        .sandbox
        .execution_timeout_secs
        .map(|s| format!("{s}s"))
        .unwrap_or_else(|| "none".to_string());
    let operator = config
        .host
        .super_operator
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());

    let mut out = String::new();
    out.push_str("configuration OK\n");
    out.push_str(&format!("  bot name:        {}\n", config.bot.name));
    out.push_str(&format!("  log level:       {}\n", config.bot.log_level));
    out.push_str(&format!("  telegram token:  {token}\n"));
    out.push_str(&format!("  database:        {}\n", config.storage.database_path));
    out.push_str(&format!("  command marker:  {}\n", config.host.command_marker));
    out.push_str(&format!("  default access:  {}\n", config.host.default_access_mode));
    out.push_str(&format!("  super operator:  {operator}\n"));
    out.push_str(&format!(
        "  finish words:    {}\n",
        config.host.finish_words.join(", ")
    ));
    out.push_str(&format!("  script timeout:  {timeout}\n"));
    out.push_str(&format!(
        "  script modules:  {}\n",
        config.sandbox.modules.join(", ")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlet_core::{ExecutionKind, Script, ScriptCapabilities, UserId};

    fn script(chat: i64, command: &str) -> Script {
        Script {
            chat_id: ChatId(chat),
            command: command.to_string(),
            description: "desc".to_string(),
            code: "function execute() end".to_string(),
            author: "alice".to_string(),
            author_id: UserId(1),
            capabilities: ScriptCapabilities {
                has_execute: true,
                ..Default::default()
            },
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn collects_one_chat_or_all() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.put_script(&script(-5, "/zeta")).await.unwrap();
        store.put_script(&script(-5, "/alpha")).await.unwrap();
        store.put_script(&script(7, "/ping")).await.unwrap();

        let one = collect_scripts(&store, Some(7)).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].command, "/ping");

        let all = collect_scripts(&store, None).await.unwrap();
        let keys: Vec<_> = all.iter().map(|r| (r.chat_id, r.command.as_str())).collect();
        assert_eq!(keys, vec![(-5, "/alpha"), (-5, "/zeta"), (7, "/ping")]);
    }

    #[test]
    fn plain_script_table_groups_by_chat() {
        let rows = vec![
            ScriptRow {
                chat_id: -5,
                command: "/a".into(),
                description: "first".into(),
                author: "alice".into(),
            },
            ScriptRow {
                chat_id: -5,
                command: "/b".into(),
                description: "second".into(),
                author: "bob".into(),
            },
        ];
        let out = render_scripts(&rows, false);
        assert_eq!(out.matches("chat -5").count(), 1);
        assert!(out.contains("/a - first (alice)"));
        assert!(out.contains("/b - second (bob)"));
        assert_eq!(render_scripts(&[], false), "  no scripts stored\n");
    }

    #[test]
    fn plain_log_table_shows_errors() {
        let entries = vec![ExecutionLogEntry {
            chat_id: ChatId(1),
            user_id: UserId(2),
            command: "/boom".into(),
            kind: ExecutionKind::Command,
            success: false,
            error_message: Some("attempt to call a nil value".into()),
            executed_at: "2026-01-01T00:00:00.000Z".into(),
        }];
        let out = render_logs(&entries, false);
        assert!(out.contains("[FAIL]"));
        assert!(out.contains("/boom user=2"));
        assert!(out.contains("attempt to call a nil value"));
    }

    #[test]
    fn summary_flags_missing_token() {
        let mut config = ChatletConfig::default();
        assert!(config_summary(&config).contains("missing"));
        config.telegram.bot_token = Some("1:abc".into());
        let summary = config_summary(&config);
        assert!(summary.contains("telegram token:  set"));
        assert!(summary.contains("script timeout:  none"));
    }
}
