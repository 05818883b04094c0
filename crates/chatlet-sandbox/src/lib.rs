// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lua runtime for Chatlet scripts.
//!
//! - [`capabilities`] inspects script code for entry points at commit time.
//! - [`libs`] assembles the library namespaces a script can see.
//! - [`context`] defines the `ctx` handle and the `event` table.
//! - [`runtime`] loads, caches, and invokes scripts.

pub mod capabilities;
pub mod context;
pub mod libs;
pub mod runtime;

pub use context::ScriptAction;
pub use runtime::{EntryPoint, Invocation, InvocationResult, ScriptSandbox};
