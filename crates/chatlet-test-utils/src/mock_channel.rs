// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound events and
//! captured outbound messages, documents, and callback acknowledgements.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use chatlet_core::{
    AdapterType, ChannelAdapter, ChatAdministrator, ChatId, ChatletError, FormatMode,
    HealthStatus, InboundEvent, MessageId, OutboundDocument, OutboundMessage, PluginAdapter,
};

/// A recorded `acknowledge_callback` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub query_id: String,
    pub text: Option<String>,
}

/// A mock transport for testing.
///
/// - **inbound**: events injected via `inject_event()` are returned by `receive()`
/// - **sent**: messages, documents, and acknowledgements are captured for assertions
/// - **administrators**: per-chat rosters returned by `get_administrators()`
pub struct MockChannel {
    inbound: Arc<Mutex<VecDeque<InboundEvent>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    documents: Arc<Mutex<Vec<OutboundDocument>>>,
    acks: Arc<Mutex<Vec<Acknowledgement>>>,
    admins: Arc<Mutex<HashMap<ChatId, Vec<ChatAdministrator>>>>,
    rejected_formats: Arc<Mutex<HashSet<FormatMode>>>,
    admin_lookup_fails: AtomicBool,
    admin_lookups: AtomicUsize,
    notify: Arc<Notify>,
}

impl MockChannel {
    /// Create a new mock channel with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            documents: Arc::new(Mutex::new(Vec::new())),
            acks: Arc::new(Mutex::new(Vec::new())),
            admins: Arc::new(Mutex::new(HashMap::new())),
            rejected_formats: Arc::new(Mutex::new(HashSet::new())),
            admin_lookup_fails: AtomicBool::new(false),
            admin_lookups: AtomicUsize::new(0),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Inject an inbound event into the receive queue.
    pub async fn inject_event(&self, event: InboundEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Set the administrator roster of a chat.
    pub async fn set_administrators(&self, chat_id: ChatId, admins: Vec<ChatAdministrator>) {
        self.admins.lock().await.insert(chat_id, admins);
    }

    /// Make `get_administrators()` fail, as a transport outage would.
    pub fn fail_admin_lookups(&self, fail: bool) {
        self.admin_lookup_fails.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_administrators()` calls so far.
    pub fn admin_lookups(&self) -> usize {
        self.admin_lookups.load(Ordering::SeqCst)
    }

    /// Make `send()` reject messages in `mode`, as the real transport does for
    /// malformed entities.
    pub async fn reject_format(&self, mode: FormatMode) {
        self.rejected_formats.lock().await.insert(mode);
    }

    /// Get all messages that were accepted by `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts of all accepted messages, in send order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.text.clone()).collect()
    }

    /// Text of the most recent accepted message.
    pub async fn last_text(&self) -> Option<String> {
        self.sent.lock().await.last().map(|m| m.text.clone())
    }

    /// Get the count of sent messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn sent_documents(&self) -> Vec<OutboundDocument> {
        self.documents.lock().await.clone()
    }

    pub async fn acknowledgements(&self) -> Vec<Acknowledgement> {
        self.acks.lock().await.clone()
    }

    /// Clear all captured output.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
        self.documents.lock().await.clear();
        self.acks.lock().await.clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn mock_id() -> MessageId {
    MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4()))
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatletError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatletError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), ChatletError> {
        Ok(())
    }

    async fn receive(&self) -> Result<InboundEvent, ChatletError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ChatletError> {
        if self.rejected_formats.lock().await.contains(&msg.format) {
            return Err(ChatletError::Channel {
                message: format!("can't parse entities in {} text", msg.format),
                source: None,
            });
        }
        self.sent.lock().await.push(msg);
        Ok(mock_id())
    }

    async fn send_document(&self, doc: OutboundDocument) -> Result<MessageId, ChatletError> {
        self.documents.lock().await.push(doc);
        Ok(mock_id())
    }

    async fn acknowledge_callback(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChatletError> {
        self.acks.lock().await.push(Acknowledgement {
            query_id: query_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn get_administrators(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ChatAdministrator>, ChatletError> {
        self.admin_lookups.fetch_add(1, Ordering::SeqCst);
        if self.admin_lookup_fails.load(Ordering::SeqCst) {
            return Err(ChatletError::Channel {
                message: "administrator lookup unavailable".into(),
                source: None,
            });
        }
        Ok(self
            .admins
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chatlet_core::{ChatKind, ChatRef, Sender, UserId};

    use super::*;

    fn make_text(text: &str) -> InboundEvent {
        InboundEvent::Text {
            chat: ChatRef {
                id: ChatId(1),
                kind: ChatKind::Private,
            },
            sender: Sender {
                id: UserId(7),
                username: Some("tester".into()),
                first_name: None,
            },
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn receive_returns_injected_events_in_order() {
        let channel = MockChannel::new();
        channel.inject_event(make_text("first")).await;
        channel.inject_event(make_text("second")).await;

        assert_eq!(channel.receive().await.unwrap(), make_text("first"));
        assert_eq!(channel.receive().await.unwrap(), make_text("second"));
    }

    #[tokio::test]
    async fn receive_waits_for_injection() {
        let channel = Arc::new(MockChannel::new());
        let channel_clone = channel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            channel_clone.inject_event(make_text("delayed")).await;
        });

        let received = tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            channel.receive(),
        )
        .await
        .expect("receive timed out")
        .unwrap();
        assert_eq!(received, make_text("delayed"));
    }

    #[tokio::test]
    async fn send_captures_messages() {
        let channel = MockChannel::new();
        let id = channel
            .send(OutboundMessage::plain(ChatId(1), "hello"))
            .await
            .unwrap();
        assert!(id.0.starts_with("mock-msg-"));
        assert_eq!(channel.sent_texts().await, vec!["hello"]);
        assert_eq!(channel.last_text().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn rejected_formats_fail_without_capture() {
        let channel = MockChannel::new();
        channel.reject_format(FormatMode::Markdown).await;
        let msg = OutboundMessage::plain(ChatId(1), "x").with_format(FormatMode::Markdown);
        assert!(channel.send(msg).await.is_err());
        assert_eq!(channel.sent_count().await, 0);
    }

    #[tokio::test]
    async fn administrators_are_per_chat_and_counted() {
        let channel = MockChannel::new();
        let admin = ChatAdministrator {
            user_id: UserId(5),
            is_creator: true,
        };
        channel.set_administrators(ChatId(-1), vec![admin]).await;

        assert_eq!(channel.get_administrators(ChatId(-1)).await.unwrap(), vec![admin]);
        assert!(channel.get_administrators(ChatId(-2)).await.unwrap().is_empty());
        channel.fail_admin_lookups(true);
        assert!(channel.get_administrators(ChatId(-1)).await.is_err());
        assert_eq!(channel.admin_lookups(), 3);
    }

    #[tokio::test]
    async fn acknowledgements_and_clear() {
        let channel = MockChannel::new();
        channel.acknowledge_callback("q1", Some("ok")).await.unwrap();
        assert_eq!(
            channel.acknowledgements().await,
            vec![Acknowledgement {
                query_id: "q1".into(),
                text: Some("ok".into()),
            }]
        );
        channel.clear_sent().await;
        assert!(channel.acknowledgements().await.is_empty());
    }
}
