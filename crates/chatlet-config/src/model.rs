// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chatlet extension host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use chatlet_core::AccessMode;
use serde::{Deserialize, Serialize};

/// Top-level Chatlet configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatletConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub bot: BotConfig,

    /// Telegram transport settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Extension host behavior: commands, sessions, permissions.
    #[serde(default)]
    pub host: HostConfig,

    /// Script runtime settings.
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name used in greetings and logs.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "chatlet".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. Required by `chatlet serve`.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatlet").join("chatlet.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatlet.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Extension host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Prefix that marks a message as a command.
    #[serde(default = "default_command_marker")]
    pub command_marker: String,

    /// User id that bypasses every per-chat permission check.
    #[serde(default)]
    pub super_operator: Option<i64>,

    /// Access mode given to a chat when its settings are first created.
    #[serde(default = "default_access_mode")]
    pub default_access_mode: AccessMode,

    /// Words that end an upload session and commit the script.
    #[serde(default = "default_finish_words")]
    pub finish_words: Vec<String>,

    /// Words that ask for another chunk without changing the buffer.
    #[serde(default = "default_continue_words")]
    pub continue_words: Vec<String>,

    /// File extensions accepted as script uploads.
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,

    /// Longest script code shown inline by `/viewscript`; longer code is sent as a file.
    #[serde(default = "default_inline_view_limit")]
    pub inline_view_limit: usize,

    /// Characters of current code shown when an edit session starts.
    #[serde(default = "default_edit_preview_limit")]
    pub edit_preview_limit: usize,

    /// Maximum characters of a script error shown to chat users.
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,

    /// Seconds a per-user worker stays alive without events.
    #[serde(default = "default_worker_idle_secs")]
    pub worker_idle_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command_marker: default_command_marker(),
            super_operator: None,
            default_access_mode: default_access_mode(),
            finish_words: default_finish_words(),
            continue_words: default_continue_words(),
            document_extensions: default_document_extensions(),
            inline_view_limit: default_inline_view_limit(),
            edit_preview_limit: default_edit_preview_limit(),
            error_message_limit: default_error_message_limit(),
            worker_idle_secs: default_worker_idle_secs(),
        }
    }
}

fn default_command_marker() -> String {
    "/".to_string()
}

fn default_access_mode() -> AccessMode {
    AccessMode::AdminsOnly
}

fn default_finish_words() -> Vec<String> {
    ["нет", "no", "готово", "done", "сохранить", "save"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_continue_words() -> Vec<String> {
    ["да", "yes", "ещё", "еще", "more"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_document_extensions() -> Vec<String> {
    vec![".txt".to_string()]
}

fn default_inline_view_limit() -> usize {
    3000
}

fn default_edit_preview_limit() -> usize {
    3500
}

fn default_error_message_limit() -> usize {
    500
}

fn default_worker_idle_secs() -> u64 {
    300
}

/// Script runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    /// Hard deadline per invocation. `None` means scripts may run indefinitely.
    #[serde(default)]
    pub execution_timeout_secs: Option<u64>,

    /// Library namespaces exposed to scripts.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Global function every script must define.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Global function called on every text message.
    #[serde(default = "default_trigger_entry_point")]
    pub trigger_entry_point: String,

    /// Recognized callback handler names, in lookup order.
    #[serde(default = "default_callback_handlers")]
    pub callback_handlers: Vec<String>,

    /// VM instructions between deadline checks.
    #[serde(default = "default_hook_instruction_interval")]
    pub hook_instruction_interval: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            execution_timeout_secs: None,
            modules: default_modules(),
            entry_point: default_entry_point(),
            trigger_entry_point: default_trigger_entry_point(),
            callback_handlers: default_callback_handlers(),
            hook_instruction_interval: default_hook_instruction_interval(),
        }
    }
}

fn default_modules() -> Vec<String> {
    [
        "string",
        "table",
        "math",
        "utf8",
        "os",
        "io",
        "coroutine",
        "json",
        "log",
        "time",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_entry_point() -> String {
    "execute".to_string()
}

fn default_trigger_entry_point() -> String {
    "check_triggers".to_string()
}

fn default_callback_handlers() -> Vec<String> {
    vec!["handle_callback".to_string(), "on_callback".to_string()]
}

fn default_hook_instruction_interval() -> u32 {
    10_000
}
