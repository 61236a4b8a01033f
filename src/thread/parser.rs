//! Message Parser Module
//!
//! Turns raw thread records into the typed records cached per tier. A single
//! parser is built at startup and shared by reference.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::thread::raw::{RawHeader, RawMessage, RawThread};
use crate::thread::record::{CompleteThread, Headers, Message, ThreadSummary};

/// Label marking a message as unread.
pub const UNREAD_LABEL: &str = "UNREAD";

const DEFAULT_SNIPPET_CHARS: usize = 200;

// == Message Parser ==
/// Immutable converter from raw records to cached records.
#[derive(Debug, Clone)]
pub struct MessageParser {
    /// Snippets longer than this are cut at a char boundary
    max_snippet_chars: usize,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(DEFAULT_SNIPPET_CHARS)
    }
}

impl MessageParser {
    pub fn new(max_snippet_chars: usize) -> Self {
        Self { max_snippet_chars }
    }

    /// Builds the summary tier record of a thread.
    pub fn summarize(&self, raw: RawThread) -> ThreadSummary {
        let subject = raw.messages.first().and_then(|first| {
            first
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("subject"))
                .map(|h| unfold(&h.value))
        });
        let last_message_at = raw
            .messages
            .iter()
            .filter_map(|m| parse_internal_date(m.internal_date.as_deref()))
            .max();
        let unread = raw
            .messages
            .iter()
            .any(|m| m.label_ids.iter().any(|l| l == UNREAD_LABEL));

        ThreadSummary {
            snippet: self.snippet(&raw.snippet),
            message_count: raw.messages.len(),
            id: raw.id,
            history_id: raw.history_id,
            subject,
            last_message_at,
            unread,
        }
    }

    /// Builds the complete tier record of a thread.
    ///
    /// # Errors
    /// `CacheError::EmptyThread` when the thread has no messages.
    pub fn complete(&self, raw: RawThread) -> Result<CompleteThread> {
        if raw.messages.is_empty() {
            return Err(CacheError::EmptyThread(raw.id));
        }

        debug!(thread_id = %raw.id, messages = raw.messages.len(), "Parsing complete thread");
        let messages = raw
            .messages
            .into_iter()
            .map(|m| self.message(m))
            .collect();

        Ok(CompleteThread {
            snippet: self.snippet(&raw.snippet),
            id: raw.id,
            history_id: raw.history_id,
            messages,
        })
    }

    /// Converts one raw message. Headers are parsed lazily on first access.
    pub fn message(&self, raw: RawMessage) -> Message {
        Message::new(
            raw.id,
            raw.thread_id,
            raw.label_ids,
            self.snippet(&raw.snippet),
            parse_internal_date(raw.internal_date.as_deref()),
            raw.body,
            raw.headers,
        )
    }

    fn snippet(&self, snippet: &str) -> String {
        snippet.chars().take(self.max_snippet_chars).collect()
    }
}

/// Unfolds and normalizes raw headers: names lower-cased, folded values
/// joined into one line.
pub fn parse_headers(raw: Vec<RawHeader>) -> Headers {
    Headers::from_entries(
        raw.into_iter()
            .map(|h| (h.name.trim().to_ascii_lowercase(), unfold(&h.value)))
            .collect(),
    )
}

/// Joins continuation lines of a folded header value with single spaces.
fn unfold(value: &str) -> String {
    let mut unfolded = String::with_capacity(value.len());
    for line in value.lines() {
        let line = line.trim_matches([' ', '\t']);
        if line.is_empty() {
            continue;
        }
        if !unfolded.is_empty() {
            unfolded.push(' ');
        }
        unfolded.push_str(line);
    }
    unfolded
}

fn parse_internal_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|ms| ms.trim().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}
