//! Rolling human-visible error log.
//!
//! Messages accumulate as newline-joined text and the whole log clears once
//! no message has been appended for the reset delay. Only the most recent
//! lines are kept.

use rotor_common::consts::{ERROR_CLEAR_MS, ERROR_LOG_MAX_LINES};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug)]
pub struct ErrorLog {
    lines: VecDeque<String>,
    last_append_ms: u64,
    clear_after_ms: u64,
    max_lines: usize,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(ERROR_CLEAR_MS)
    }
}

impl ErrorLog {
    pub fn new(clear_after_ms: u64) -> Self {
        Self {
            lines: VecDeque::new(),
            last_append_ms: 0,
            clear_after_ms,
            max_lines: ERROR_LOG_MAX_LINES,
        }
    }

    /// Append a message; empty messages are ignored.
    pub fn append(&mut self, message: &str, now_ms: u64) {
        if message.is_empty() {
            return;
        }
        warn!("{message}");
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(message.to_string());
        self.last_append_ms = now_ms;
    }

    /// Clear the log once the reset delay has passed since the last append.
    pub fn expire(&mut self, now_ms: u64) {
        if !self.lines.is_empty()
            && now_ms.saturating_sub(self.last_append_ms) >= self.clear_after_ms
        {
            self.lines.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Newline-joined log text.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
