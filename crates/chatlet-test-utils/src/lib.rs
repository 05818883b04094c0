// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chatlet integration tests.
//!
//! Provides a mock transport and a harness that wires a complete host over a
//! temporary database, so the whole pipeline runs without network access.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock transport with event injection and output capture
//! - [`TestHarness`] - Host, registry, and storage assembled over a temp DB

pub mod harness;
pub mod mock_channel;

pub use harness::{submission, TestHarness, TestHarnessBuilder};
pub use mock_channel::MockChannel;
