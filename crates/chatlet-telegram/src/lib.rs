// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Chatlet extension host.
//!
//! Implements [`ChannelAdapter`] over the Telegram Bot API via teloxide.
//! Text messages, documents, and inline button presses become
//! [`InboundEvent`]s; replies honor the requested [`FormatMode`] and report
//! rejected markup as errors so the host can fall back.

pub mod handler;
pub mod media;

use async_trait::async_trait;
use chatlet_config::model::TelegramConfig;
use chatlet_core::{
    AdapterType, ChannelAdapter, ChatAdministrator, ChatId, ChatletError, FormatMode,
    HealthStatus, InboundEvent, InlineKeyboard, MessageId, OutboundDocument, OutboundMessage,
    PluginAdapter, UserId,
};
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode,
    Recipient,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Inbound queue depth between the polling task and the host.
const INBOUND_BUFFER: usize = 100;

/// Telegram channel adapter.
///
/// Connects via long polling and forwards updates through an mpsc queue.
pub struct TelegramChannel {
    bot: Bot,
    inbound_rx: Mutex<mpsc::Receiver<InboundEvent>>,
    inbound_tx: mpsc::Sender<InboundEvent>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Returns an error if no bot token is configured.
    pub fn new(config: TelegramConfig) -> Result<Self, ChatletError> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ChatletError::Config(
                    "telegram.bot_token is required; set it in chatlet.toml or CHATLET_TELEGRAM_BOT_TOKEN"
                        .into(),
                )
            })?;

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        Ok(Self {
            bot,
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }

    /// The underlying teloxide bot handle.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Parse mode for a format, `None` for plain text.
#[allow(deprecated)]
pub fn parse_mode(format: FormatMode) -> Option<ParseMode> {
    match format {
        FormatMode::Markdown => Some(ParseMode::Markdown),
        FormatMode::MarkdownV2 => Some(ParseMode::MarkdownV2),
        FormatMode::Html => Some(ParseMode::Html),
        FormatMode::Plain => None,
    }
}

/// Inline keyboard markup with one callback button per entry.
pub fn keyboard_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn channel_error(what: &str, err: teloxide::RequestError) -> ChatletError {
    ChatletError::Channel {
        message: format!("{what}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatletError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(format!("Telegram API error: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), ChatletError> {
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        info!("Telegram channel shut down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), ChatletError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| channel_error("failed to reach Telegram", e))?;
        info!(
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "connected to Telegram"
        );

        let bot = self.bot.clone();
        let message_tx = self.inbound_tx.clone();
        let callback_tx = self.inbound_tx.clone();

        let handle = tokio::spawn(async move {
            let tree = dptree::entry()
                .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                    let tx = message_tx.clone();
                    async move {
                        if let Some(event) = message_event(&bot, &msg).await {
                            if tx.send(event).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        respond(())
                    }
                }))
                .branch(Update::filter_callback_query().endpoint(
                    move |bot: Bot, query: CallbackQuery| {
                        let tx = callback_tx.clone();
                        async move {
                            match handler::callback_event(&query) {
                                Some(event) => {
                                    if tx.send(event).await.is_err() {
                                        warn!("inbound channel closed, dropping callback");
                                    }
                                }
                                None => {
                                    // Nothing can claim it; clear the client spinner.
                                    if let Err(e) = bot.answer_callback_query(query.id).await {
                                        debug!(error = %e, "failed to answer unroutable callback");
                                    }
                                }
                            }
                            respond(())
                        }
                    },
                ));

            Dispatcher::builder(bot, tree)
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundEvent, ChatletError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| ChatletError::Channel {
            message: "inbound channel closed".into(),
            source: None,
        })
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ChatletError> {
        let mut request = self
            .bot
            .send_message(Recipient::Id(teloxide::types::ChatId(msg.chat_id.0)), msg.text);
        if let Some(mode) = parse_mode(msg.format) {
            request = request.parse_mode(mode);
        }
        if let Some(keyboard) = &msg.keyboard {
            request = request.reply_markup(keyboard_markup(keyboard));
        }

        let sent = request.await.map_err(|e| {
            debug!(format = %msg.format, error = %e, "Telegram rejected message");
            channel_error("failed to send message", e)
        })?;
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn send_document(&self, doc: OutboundDocument) -> Result<MessageId, ChatletError> {
        let mut request = self.bot.send_document(
            Recipient::Id(teloxide::types::ChatId(doc.chat_id.0)),
            media::input_file(&doc),
        );
        if let Some(caption) = doc.caption.clone() {
            request = request.caption(caption);
        }
        let sent = request
            .await
            .map_err(|e| channel_error("failed to send document", e))?;
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn acknowledge_callback(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChatletError> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(query_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        request
            .await
            .map_err(|e| channel_error("failed to answer callback", e))?;
        Ok(())
    }

    async fn get_administrators(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ChatAdministrator>, ChatletError> {
        let members = self
            .bot
            .get_chat_administrators(Recipient::Id(teloxide::types::ChatId(chat_id.0)))
            .await
            .map_err(|e| channel_error("failed to fetch administrators", e))?;
        Ok(members
            .iter()
            .map(|m| ChatAdministrator {
                user_id: UserId(m.user.id.0 as i64),
                is_creator: matches!(m.kind, ChatMemberKind::Owner(_)),
            })
            .collect())
    }
}

/// Convert a message into an event, downloading documents when present.
async fn message_event(bot: &Bot, msg: &Message) -> Option<InboundEvent> {
    if let Some(event) = handler::text_event(msg) {
        return Some(event);
    }
    let doc = match handler::script_document(msg) {
        Some(doc) => doc,
        None => {
            if msg.document().is_some() {
                warn!(chat_id = msg.chat.id.0, "document too large, ignoring");
            }
            return None;
        }
    };
    match media::download_document(bot, doc).await {
        Ok((filename, bytes)) => handler::document_event(msg, filename, bytes),
        Err(e) => {
            error!(chat_id = msg.chat.id.0, error = %e, "failed to download document");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlet_core::InlineButton;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
        }
    }

    #[test]
    fn new_requires_token() {
        assert!(matches!(
            TelegramChannel::new(config(None)),
            Err(ChatletError::Config(_))
        ));
        assert!(matches!(
            TelegramChannel::new(config(Some("  "))),
            Err(ChatletError::Config(_))
        ));
    }

    #[tokio::test]
    async fn new_with_token_succeeds() {
        let channel = TelegramChannel::new(config(Some("test:token"))).unwrap();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.adapter_type(), AdapterType::Channel);
    }

    #[test]
    fn parse_modes_map_one_to_one() {
        assert_eq!(parse_mode(FormatMode::MarkdownV2), Some(ParseMode::MarkdownV2));
        assert_eq!(parse_mode(FormatMode::Html), Some(ParseMode::Html));
        assert_eq!(parse_mode(FormatMode::Plain), None);
        assert!(parse_mode(FormatMode::Markdown).is_some());
    }

    #[test]
    fn keyboard_keeps_row_layout() {
        let button = |t: &str| InlineButton {
            text: t.to_uppercase(),
            data: t.to_string(),
        };
        let keyboard = InlineKeyboard {
            rows: vec![vec![button("a"), button("b")], vec![button("c")]],
        };
        let markup = keyboard_markup(&keyboard);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "C");
    }
}
