//! Thread Source Module
//!
//! The boundary to the remote message API. Transport and authentication live
//! behind this trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::thread::raw::RawThread;

// == Thread Source ==
/// Remote data source for threads.
///
/// Implementations apply their own timeouts; errors surface to cache callers
/// as fetch failures.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Fetches thread metadata without message contents.
    async fn fetch_summary(&self, thread_id: &str) -> anyhow::Result<RawThread>;

    /// Fetches the thread with every message in full.
    async fn fetch_complete(&self, thread_id: &str) -> anyhow::Result<RawThread>;
}

// == Static Thread Source ==
/// In-memory source serving a fixed set of threads, with optional latency.
#[derive(Debug, Default)]
pub struct StaticThreadSource {
    threads: RwLock<HashMap<String, RawThread>>,
    latency: Option<Duration>,
    summary_calls: AtomicUsize,
    complete_calls: AtomicUsize,
}

impl StaticThreadSource {
    pub fn new(threads: impl IntoIterator<Item = RawThread>) -> Self {
        Self {
            threads: RwLock::new(threads.into_iter().map(|t| (t.id.clone(), t)).collect()),
            ..Self::default()
        }
    }

    /// Loads threads from a JSON array of raw thread objects.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let threads: Vec<RawThread> = serde_json::from_str(json)?;
        Ok(Self::new(threads))
    }

    /// Delays every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds or replaces a thread.
    pub async fn upsert(&self, thread: RawThread) {
        self.threads.write().await.insert(thread.id.clone(), thread);
    }

    pub async fn remove(&self, thread_id: &str) -> Option<RawThread> {
        self.threads.write().await.remove(thread_id)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    async fn lookup(&self, thread_id: &str) -> anyhow::Result<RawThread> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .ok_or_else(|| anyhow!("thread {} not found", thread_id))
    }
}

#[async_trait]
impl ThreadSource for StaticThreadSource {
    async fn fetch_summary(&self, thread_id: &str) -> anyhow::Result<RawThread> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup(thread_id).await?.without_bodies())
    }

    async fn fetch_complete(&self, thread_id: &str) -> anyhow::Result<RawThread> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(thread_id).await
    }
}
