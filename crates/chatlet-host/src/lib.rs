// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Chatlet extension host.
//!
//! Everything between the transport and the script runtime lives here: the
//! header parser and sentinel vocabulary, the write-through script registry,
//! the per-chat permission policy, the multi-turn ingestion engine, the three
//! dispatch paths, and the per-user event router that drives them.

pub mod audit;
pub mod commands;
pub mod dispatcher;
pub mod format;
pub mod header;
pub mod host;
pub mod ingestion;
pub mod policy;
pub mod registry;
pub mod router;
pub mod vocabulary;

pub use dispatcher::{CallbackOutcome, DispatchOutcome, Dispatcher};
pub use host::ExtensionHost;
pub use ingestion::{IngestionEngine, IngestionOutcome, SessionKind, UploadSession};
pub use policy::PermissionPolicy;
pub use registry::ScriptRegistry;
pub use router::EventRouter;

/// Current UTC time in the RFC 3339 form stored alongside every record.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
