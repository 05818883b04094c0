// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Formatting fallback for outgoing text.
//!
//! Scripts emit arbitrary text. Each strategy is tried in order: first a local
//! check that the text is well formed for the mode, then the transport itself.
//! Plain always validates, so a message is never dropped for formatting alone.

use chatlet_core::{
    ChannelAdapter, ChatId, ChatletError, FormatMode, InlineKeyboard, MessageId, OutboundMessage,
};
use tracing::debug;

/// A format mode paired with a local well-formedness check.
#[derive(Debug, Clone, Copy)]
pub struct FormatStrategy {
    pub mode: FormatMode,
    validate: fn(&str) -> bool,
}

impl FormatStrategy {
    pub fn accepts(&self, text: &str) -> bool {
        (self.validate)(text)
    }
}

/// The fallback chain: Markdown, then MarkdownV2, then plain text.
pub fn strategies() -> [FormatStrategy; 3] {
    [
        FormatStrategy {
            mode: FormatMode::Markdown,
            validate: markdown_is_balanced,
        },
        FormatStrategy {
            mode: FormatMode::MarkdownV2,
            validate: markdown_v2_is_escaped,
        },
        FormatStrategy {
            mode: FormatMode::Plain,
            validate: |_| true,
        },
    ]
}

/// Characters MarkdownV2 reserves outside code spans.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Legacy Markdown: `*` and `_` pair up outside code, code spans close.
pub fn markdown_is_balanced(text: &str) -> bool {
    let mut stars = 0usize;
    let mut underscores = 0usize;
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("```") {
            let Some(end) = after.find("```") else {
                return false;
            };
            rest = &after[end + 3..];
            continue;
        }
        rest = &rest[c.len_utf8()..];
        match c {
            '`' => {
                let Some(end) = rest.find('`') else {
                    return false;
                };
                rest = &rest[end + 1..];
            }
            '\\' => {
                if let Some(next) = rest.chars().next() {
                    rest = &rest[next.len_utf8()..];
                }
            }
            '*' => stars += 1,
            '_' => underscores += 1,
            _ => {}
        }
    }
    stars % 2 == 0 && underscores % 2 == 0
}

/// MarkdownV2: every reserved character outside code must be escaped.
pub fn markdown_v2_is_escaped(text: &str) -> bool {
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("```") {
            let Some(end) = after.find("```") else {
                return false;
            };
            rest = &after[end + 3..];
            continue;
        }
        rest = &rest[c.len_utf8()..];
        match c {
            '\\' => match rest.chars().next() {
                Some(next) => rest = &rest[next.len_utf8()..],
                None => return false,
            },
            '`' => {
                let Some(end) = rest.find('`') else {
                    return false;
                };
                rest = &rest[end + 1..];
            }
            c if MARKDOWN_V2_RESERVED.contains(&c) => return false,
            _ => {}
        }
    }
    true
}

/// Escape user-supplied text for embedding in a legacy Markdown message.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Host-authored reply text in two renderings: legacy Markdown with every
/// user-supplied fragment escaped, and the same text unescaped for plain sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostText {
    markdown: String,
    plain: String,
}

impl HostText {
    /// Append host text that reads the same in both renderings.
    pub fn literal(mut self, text: &str) -> Self {
        self.markdown.push_str(text);
        self.plain.push_str(text);
        self
    }

    /// Append a user-supplied fragment, escaped only in the Markdown rendering.
    pub fn user(mut self, text: &str) -> Self {
        self.markdown.push_str(&escape_markdown(text));
        self.plain.push_str(text);
        self
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn plain(&self) -> &str {
        &self.plain
    }
}

impl From<&str> for HostText {
    fn from(text: &str) -> Self {
        Self::default().literal(text)
    }
}

impl From<String> for HostText {
    fn from(text: String) -> Self {
        Self {
            markdown: text.clone(),
            plain: text,
        }
    }
}

/// Send host-authored text as legacy Markdown, falling back to the unescaped
/// rendering as plain text.
pub async fn send_host_text(
    channel: &(dyn ChannelAdapter + Send + Sync),
    chat_id: ChatId,
    text: &HostText,
) -> Result<MessageId, ChatletError> {
    if markdown_is_balanced(&text.markdown) {
        let msg = OutboundMessage::plain(chat_id, text.markdown.as_str())
            .with_format(FormatMode::Markdown);
        match channel.send(msg).await {
            Ok(id) => return Ok(id),
            Err(e) => debug!(error = %e, "transport rejected markdown, sending plain"),
        }
    } else {
        debug!("host text is not well formed markdown, sending plain");
    }
    channel
        .send(OutboundMessage::plain(chat_id, text.plain.as_str()))
        .await
}

/// Send `text` with the first format mode that both validates and is accepted
/// by the transport.
pub async fn send_formatted(
    channel: &(dyn ChannelAdapter + Send + Sync),
    chat_id: ChatId,
    text: &str,
    keyboard: Option<&InlineKeyboard>,
) -> Result<MessageId, ChatletError> {
    let mut last_err = None;
    for strategy in strategies() {
        if !strategy.accepts(text) {
            debug!(mode = %strategy.mode, "text is not well formed for mode, skipping");
            continue;
        }
        let mut msg = OutboundMessage::plain(chat_id, text).with_format(strategy.mode);
        if let Some(keyboard) = keyboard {
            msg = msg.with_keyboard(keyboard.clone());
        }
        match channel.send(msg).await {
            Ok(id) => return Ok(id),
            Err(e) => {
                debug!(mode = %strategy.mode, error = %e, "transport rejected format, falling back");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ChatletError::Internal("no format strategy accepted".into())))
}

/// Send with a mode the script asked for, falling back to plain text.
pub async fn send_with_mode(
    channel: &(dyn ChannelAdapter + Send + Sync),
    chat_id: ChatId,
    text: &str,
    mode: FormatMode,
    keyboard: Option<&InlineKeyboard>,
) -> Result<MessageId, ChatletError> {
    let mut msg = OutboundMessage::plain(chat_id, text).with_format(mode);
    if let Some(keyboard) = keyboard {
        msg = msg.with_keyboard(keyboard.clone());
    }
    match channel.send(msg.clone()).await {
        Ok(id) => Ok(id),
        Err(e) if mode != FormatMode::Plain => {
            debug!(mode = %mode, error = %e, "requested format rejected, sending plain");
            channel.send(msg.with_format(FormatMode::Plain)).await
        }
        Err(e) => Err(e),
    }
}
