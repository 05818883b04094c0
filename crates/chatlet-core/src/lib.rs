// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chatlet extension host.
//!
//! This crate provides the error type, the domain types (scripts, chat settings,
//! inbound events, outbound messages), and the adapter traits the host is written
//! against. The transport and the durable store both plug in through traits defined
//! here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ChatletError;
pub use types::{
    AccessMode, AdapterType, CallbackArity, CallbackHandler, ChatAdministrator, ChatId,
    ChatKind, ChatRef, ChatSettings, ExecutionKind, ExecutionLogEntry, FormatMode,
    HealthStatus, InboundEvent, InlineButton, InlineKeyboard, MessageId, OutboundDocument,
    OutboundMessage, Script, ScriptCapabilities, ScriptSummary, Sender, UserId, UserRecord,
    DEFAULT_DESCRIPTION,
};

pub use traits::{ChannelAdapter, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn chatlet_error_has_all_variants() {
        let _config = ChatletError::Config("test".into());
        let _storage = ChatletError::storage(std::io::Error::other("test"));
        let _channel = ChatletError::Channel {
            message: "test".into(),
            source: None,
        };
        let _validation = ChatletError::Validation("test".into());
        let _denied = ChatletError::PermissionDenied("test".into());
        let _not_found = ChatletError::NotFound("test".into());
        let _execution = ChatletError::Execution {
            message: "test".into(),
        };
        let _timeout = ChatletError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ChatletError::Internal("test".into());
    }

    #[test]
    fn user_message_hides_backend_detail() {
        let err = ChatletError::storage(std::io::Error::other("disk /var/lib/x is full"));
        assert!(!err.user_message().contains("/var/lib"));

        let err = ChatletError::Validation("command is missing".into());
        assert_eq!(err.user_message(), "command is missing");
    }

    #[test]
    fn script_failures_are_classified() {
        assert!(ChatletError::Execution { message: "boom".into() }.is_script_failure());
        assert!(ChatletError::Timeout {
            duration: std::time::Duration::from_secs(1)
        }
        .is_script_failure());
        assert!(!ChatletError::NotFound("x".into()).is_script_failure());
    }

    #[test]
    fn access_mode_parses_snake_case() {
        assert_eq!(AccessMode::from_str("admins_only").unwrap(), AccessMode::AdminsOnly);
        assert_eq!(AccessMode::Everyone.to_string(), "everyone");
        let json = serde_json::to_string(&AccessMode::AllowList).unwrap();
        assert_eq!(json, "\"allow_list\"");
    }

    #[test]
    fn adapter_type_display_round_trips() {
        for variant in [
            AdapterType::Channel,
            AdapterType::Storage,
            AdapterType::ScriptRuntime,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        assert_ne!(HealthStatus::Degraded("slow".into()), healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), healthy);
    }

    #[test]
    fn sender_display_name_falls_back_to_id() {
        let named = Sender {
            id: UserId(7),
            username: Some("alice".into()),
            first_name: None,
        };
        let anonymous = Sender {
            id: UserId(7),
            username: None,
            first_name: Some("Alice".into()),
        };
        assert_eq!(named.display_name(), "alice");
        assert_eq!(anonymous.display_name(), "7");
    }

    #[test]
    fn inbound_event_accessors() {
        let chat = ChatRef {
            id: ChatId(-100),
            kind: ChatKind::Supergroup,
        };
        let event = InboundEvent::Callback {
            chat,
            sender: Sender {
                id: UserId(1),
                username: None,
                first_name: None,
            },
            query_id: "q1".into(),
            payload: "vote:yes".into(),
        };
        assert_eq!(event.chat(), chat);
        assert_eq!(event.sender().id, UserId(1));
        assert_eq!(event.kind_str(), "callback");
    }

    #[test]
    fn capabilities_serialize_compactly() {
        let caps = ScriptCapabilities {
            has_execute: true,
            has_trigger: false,
            callback: Some(CallbackHandler {
                name: "handle_callback".into(),
                arity: CallbackArity::WithPayload,
            }),
        };
        let json = serde_json::to_string(&caps).unwrap();
        let parsed: ScriptCapabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, caps);
        assert!(json.contains("with_payload"));
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_adapter<T: ChannelAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
    }
}
