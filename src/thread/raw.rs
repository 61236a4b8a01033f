//! Raw thread records as delivered by the remote message API.
//!
//! Field names follow the API's camelCase JSON.

use serde::{Deserialize, Serialize};

/// A header line, possibly folded over several lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeader {
    pub name: String,
    pub value: String,
}

impl RawHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One message of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    /// Milliseconds since the Unix epoch, as a decimal string
    pub internal_date: Option<String>,
    pub headers: Vec<RawHeader>,
    /// Decoded body text; absent in summary responses
    pub body: Option<String>,
}

/// A thread and its messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawThread {
    pub id: String,
    pub history_id: String,
    pub snippet: String,
    pub messages: Vec<RawMessage>,
}

impl RawThread {
    /// Copy of the thread with message bodies dropped, as returned for the
    /// summary tier.
    pub fn without_bodies(&self) -> RawThread {
        RawThread {
            messages: self
                .messages
                .iter()
                .map(|message| RawMessage {
                    body: None,
                    ..message.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}
