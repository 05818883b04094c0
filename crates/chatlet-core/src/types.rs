// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the host, the runtime, and the adapters.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Description stored when a submission carries no description directive.
pub const DEFAULT_DESCRIPTION: &str = "No description";

/// Identifier of a conversation on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    ScriptRuntime,
}

// --- Inbound events ---

/// The kind of conversation an event arrived in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// The conversation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: ChatId,
    pub kind: ChatKind,
}

/// Identity of the user who produced an event, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Sender {
    /// Username if the user has one, otherwise the numeric id.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.0.to_string())
    }
}

/// An event delivered by a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A plain text message (commands included).
    Text {
        chat: ChatRef,
        sender: Sender,
        text: String,
    },
    /// An uploaded file, already downloaded.
    Document {
        chat: ChatRef,
        sender: Sender,
        filename: String,
        bytes: Vec<u8>,
    },
    /// An inline button press.
    Callback {
        chat: ChatRef,
        sender: Sender,
        query_id: String,
        payload: String,
    },
}

impl InboundEvent {
    pub fn chat(&self) -> ChatRef {
        match self {
            Self::Text { chat, .. } | Self::Document { chat, .. } | Self::Callback { chat, .. } => {
                *chat
            }
        }
    }

    pub fn sender(&self) -> &Sender {
        match self {
            Self::Text { sender, .. }
            | Self::Document { sender, .. }
            | Self::Callback { sender, .. } => sender,
        }
    }

    /// Short tag used in logs and in the script-visible event table.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Document { .. } => "document",
            Self::Callback { .. } => "callback",
        }
    }
}

// --- Outbound messages ---

/// Text formatting mode requested from the transport.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FormatMode {
    Markdown,
    MarkdownV2,
    Html,
    Plain,
}

/// A single inline keyboard button carrying an opaque callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

/// Rows of inline buttons attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

/// A text message to be sent via a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub format: FormatMode,
    pub keyboard: Option<InlineKeyboard>,
}

impl OutboundMessage {
    /// A message with no formatting and no keyboard.
    pub fn plain(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            format: FormatMode::Plain,
            keyboard: None,
        }
    }

    pub fn with_format(mut self, format: FormatMode) -> Self {
        self.format = format;
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// A file to be sent via a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDocument {
    pub chat_id: ChatId,
    pub bytes: Vec<u8>,
    pub filename: String,
    pub caption: Option<String>,
}

/// One entry of a chat's administrator roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAdministrator {
    pub user_id: UserId,
    pub is_creator: bool,
}

// --- Scripts ---

/// How a callback handler expects to be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackArity {
    /// `(event, ctx, payload)`; also used for variadic handlers.
    WithPayload,
    /// `(event, ctx)`.
    WithoutPayload,
}

/// The callback handler a script declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackHandler {
    pub name: String,
    pub arity: CallbackArity,
}

/// Entry points a script defines, resolved once when the script is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCapabilities {
    pub has_execute: bool,
    pub has_trigger: bool,
    pub callback: Option<CallbackHandler>,
}

/// A chat-scoped unit of user-authored logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub chat_id: ChatId,
    /// Normalized key: lowercase and prefixed with the command marker.
    pub command: String,
    pub description: String,
    pub code: String,
    pub author: String,
    pub author_id: UserId,
    pub capabilities: ScriptCapabilities,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp; bumped on every edit.
    pub updated_at: String,
}

/// Listing row for a chat's scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSummary {
    pub command: String,
    pub description: String,
    pub author: String,
}

// --- Chat settings ---

/// Per-chat policy deciding who may mutate the chat's scripts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccessMode {
    CreatorOnly,
    AdminsOnly,
    AllowList,
    Everyone,
}

/// Access rules for one chat. Exactly one record exists per chat once initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub chat_id: ChatId,
    pub creator_id: UserId,
    pub access_mode: AccessMode,
    /// Consulted only under [`AccessMode::AllowList`].
    pub allowed_users: BTreeSet<UserId>,
    pub created_at: String,
    pub updated_at: String,
}

/// A user who has committed at least one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub created_at: String,
}

// --- Audit ---

/// Which dispatch path produced an execution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionKind {
    Command,
    Trigger,
    Callback,
}

/// One recorded execution attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub command: String,
    pub kind: ExecutionKind,
    pub success: bool,
    pub error_message: Option<String>,
    pub executed_at: String,
}
