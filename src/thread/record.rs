//! Parsed thread records for both cache tiers.

use chrono::{DateTime, Utc};

use crate::cache::Truthy;
use crate::thread::deferred::Deferred;
use crate::thread::parser::parse_headers;
use crate::thread::raw::RawHeader;

// == Headers ==
/// Unfolded headers with lower-cased names, in their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub(crate) fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    // == Lookup ==
    /// First value of the header `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every value of the header `name`, in message order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the message carried no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Message ==
/// A message of a complete thread.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub internal_date: Option<DateTime<Utc>>,
    pub body: Option<String>,
    headers: Deferred<Vec<RawHeader>, Headers>,
}

impl Message {
    pub(crate) fn new(
        id: String,
        thread_id: String,
        label_ids: Vec<String>,
        snippet: String,
        internal_date: Option<DateTime<Utc>>,
        body: Option<String>,
        raw_headers: Vec<RawHeader>,
    ) -> Self {
        Self {
            id,
            thread_id,
            label_ids,
            snippet,
            internal_date,
            body,
            headers: Deferred::new(raw_headers, parse_headers),
        }
    }

    /// Headers, unfolded on first access.
    pub fn headers(&mut self) -> &Headers {
        static EMPTY: Headers = Headers {
            entries: Vec::new(),
        };
        self.headers.get().unwrap_or(&EMPTY)
    }

    pub fn subject(&mut self) -> Option<&str> {
        self.headers().get("subject")
    }

    pub fn sender(&mut self) -> Option<&str> {
        self.headers().get("from")
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|l| l == label)
    }
}

// == Summary Tier ==
/// Lightweight thread record without message contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub id: String,
    pub history_id: String,
    pub snippet: String,
    pub subject: Option<String>,
    pub message_count: usize,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread: bool,
}

impl Truthy for ThreadSummary {
    fn is_truthy(&self) -> bool {
        !self.id.is_empty()
    }
}

// == Complete Tier ==
/// The full thread including every message.
#[derive(Debug, Clone)]
pub struct CompleteThread {
    pub id: String,
    pub history_id: String,
    pub snippet: String,
    pub messages: Vec<Message>,
}

impl CompleteThread {
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().filter_map(|m| m.internal_date).max()
    }
}

impl Truthy for CompleteThread {
    fn is_truthy(&self) -> bool {
        !self.messages.is_empty()
    }
}

// == Tier ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Summary,
    Complete,
}

// == Thread Record ==
/// A cached thread in either tier.
#[derive(Debug, Clone)]
pub enum ThreadRecord {
    Summary(ThreadSummary),
    Complete(CompleteThread),
}

impl ThreadRecord {
    pub fn tier(&self) -> Tier {
        match self {
            ThreadRecord::Summary(_) => Tier::Summary,
            ThreadRecord::Complete(_) => Tier::Complete,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ThreadRecord::Summary(summary) => &summary.id,
            ThreadRecord::Complete(thread) => &thread.id,
        }
    }

    pub fn history_id(&self) -> &str {
        match self {
            ThreadRecord::Summary(summary) => &summary.history_id,
            ThreadRecord::Complete(thread) => &thread.history_id,
        }
    }

    pub fn into_complete(self) -> Option<CompleteThread> {
        match self {
            ThreadRecord::Complete(thread) => Some(thread),
            ThreadRecord::Summary(_) => None,
        }
    }
}
