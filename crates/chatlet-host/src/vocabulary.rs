// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentinel words that steer an upload session.

use std::collections::HashSet;

use chatlet_config::model::HostConfig;

/// A recognized sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Commit the buffered script.
    Finish,
    /// Ask for another chunk; the buffer is unchanged.
    Continue,
}

/// Finish and continue word sets, stored normalized.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    finish: HashSet<String>,
    more: HashSet<String>,
}

impl Vocabulary {
    pub fn new<I, J, S>(finish: I, more: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            finish: finish.into_iter().map(|w| normalize(w.as_ref())).collect(),
            more: more.into_iter().map(|w| normalize(w.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(&config.finish_words, &config.continue_words)
    }

    /// Classify a whole message. Anything that is not exactly a sentinel is a chunk.
    pub fn classify(&self, text: &str) -> Option<Sentinel> {
        let word = normalize(text);
        if word.is_empty() {
            None
        } else if self.finish.contains(&word) {
            Some(Sentinel::Finish)
        } else if self.more.contains(&word) {
            Some(Sentinel::Continue)
        } else {
            None
        }
    }
}

/// Trim, lowercase, and drop trailing punctuation.
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c == '…')
        .trim_end()
        .to_string()
}
