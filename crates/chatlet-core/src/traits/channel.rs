// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat transport integrations.

use async_trait::async_trait;

use crate::error::ChatletError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChatAdministrator, ChatId, InboundEvent, MessageId, OutboundDocument, OutboundMessage,
};

/// Adapter for a bidirectional chat transport.
///
/// The host never sees transport types: everything crosses this boundary as
/// [`InboundEvent`] on the way in and [`OutboundMessage`] / [`OutboundDocument`]
/// on the way out.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Establishes a connection to the transport and starts receiving events.
    async fn connect(&mut self) -> Result<(), ChatletError>;

    /// Receives the next inbound event.
    async fn receive(&self) -> Result<InboundEvent, ChatletError>;

    /// Sends a text message in the requested format.
    ///
    /// Returns an error if the transport rejects the text for the given format,
    /// so callers can fall back to a more lenient one.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ChatletError>;

    /// Sends a file.
    async fn send_document(&self, doc: OutboundDocument) -> Result<MessageId, ChatletError>;

    /// Acknowledges a callback query, optionally showing a short notice.
    async fn acknowledge_callback(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChatletError>;

    /// Fetches the current administrator roster of a chat.
    async fn get_administrators(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ChatAdministrator>, ChatletError>;
}
