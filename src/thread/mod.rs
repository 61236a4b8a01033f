//! Thread Module
//!
//! Message-thread domain: raw records from the remote API, their parsed
//! summary and complete tiers, and the tiered cache over them.

mod deferred;
mod parser;
mod raw;
mod record;
mod source;
mod tiered;

pub use deferred::Deferred;
pub use parser::{parse_headers, MessageParser, UNREAD_LABEL};
pub use raw::{RawHeader, RawMessage, RawThread};
pub use record::{CompleteThread, Headers, Message, ThreadRecord, ThreadSummary, Tier};
pub use source::{StaticThreadSource, ThreadSource};
pub use tiered::{EntryState, TieredThreadCache};
