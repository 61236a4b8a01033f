//! Tiered Thread Cache Module
//!
//! Bounded LRU cache of per-thread TTL cells. Each thread is cached either as
//! a summary or as a complete record; a summary entry is replaced by a
//! complete one when a caller needs message contents.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{BoundedKeyedCache, CacheStats, TtlCell, TtlCellBuilder};
use crate::config::{CellConfig, Config};
use crate::error::{CacheError, Result};
use crate::thread::parser::MessageParser;
use crate::thread::record::{CompleteThread, ThreadRecord, ThreadSummary, Tier};
use crate::thread::source::ThreadSource;

/// What the cache currently holds for a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Summary,
    Complete,
}

impl From<Tier> for EntryState {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Summary => EntryState::Summary,
            Tier::Complete => EntryState::Complete,
        }
    }
}

#[derive(Debug, Clone)]
enum ThreadEntry {
    Summary(TtlCell<ThreadSummary>),
    Complete(TtlCell<CompleteThread>),
}

impl ThreadEntry {
    fn tier(&self) -> Tier {
        match self {
            ThreadEntry::Summary(_) => Tier::Summary,
            ThreadEntry::Complete(_) => Tier::Complete,
        }
    }

    fn history_id(&self) -> Option<String> {
        match self {
            ThreadEntry::Summary(cell) => cell.peek().map(|s| s.history_id),
            ThreadEntry::Complete(cell) => cell.peek().map(|t| t.history_id),
        }
    }

    fn refresh_expiry(&self) {
        match self {
            ThreadEntry::Summary(cell) => cell.refresh_expiry(),
            ThreadEntry::Complete(cell) => cell.refresh_expiry(),
        }
    }

    fn invalidate(&self) {
        match self {
            ThreadEntry::Summary(cell) => cell.invalidate(),
            ThreadEntry::Complete(cell) => cell.invalidate(),
        }
    }
}

// == Tiered Thread Cache ==
/// Two-tier, capacity-bounded thread cache over a [`ThreadSource`].
///
/// The keyed cache lock is only held for lookup and insertion; fetches are
/// awaited after it is released.
pub struct TieredThreadCache {
    entries: RwLock<BoundedKeyedCache<String, ThreadEntry>>,
    source: Arc<dyn ThreadSource>,
    parser: Arc<MessageParser>,
    cell_config: CellConfig,
}

impl TieredThreadCache {
    // == Constructor ==
    /// Creates a cache from configuration.
    ///
    /// # Errors
    /// `CacheError::InvalidConfig` for a zero capacity or max age.
    pub fn new(
        source: Arc<dyn ThreadSource>,
        parser: Arc<MessageParser>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        Self::with_cell_config(source, parser, config.capacity, config.cell_config())
    }

    /// Creates a cache holding at most `capacity` threads, each cached with
    /// `cell_config`.
    ///
    /// # Errors
    /// `CacheError::InvalidConfig` for a zero capacity or an out-of-range window.
    pub fn with_cell_config(
        source: Arc<dyn ThreadSource>,
        parser: Arc<MessageParser>,
        capacity: usize,
        cell_config: CellConfig,
    ) -> Result<Self> {
        cell_config.validate()?;

        Ok(Self {
            entries: RwLock::new(BoundedKeyedCache::new(capacity)?),
            source,
            parser,
            cell_config,
        })
    }

    // == Get ==
    /// Returns the cached record for a thread in whichever tier is cached,
    /// fetching a summary when the thread is absent.
    pub async fn get(&self, thread_id: &str) -> Result<ThreadRecord> {
        let entry = {
            let mut entries = self.entries.write().await;
            match entries.get(thread_id).cloned() {
                Some(entry) => entry,
                None => {
                    debug!(thread_id, "Caching thread summary");
                    let entry = ThreadEntry::Summary(self.summary_cell(thread_id, None));
                    self.insert(&mut entries, thread_id, entry.clone());
                    entry
                }
            }
        };

        match entry {
            ThreadEntry::Summary(cell) => cell.get_data().await.map(ThreadRecord::Summary),
            ThreadEntry::Complete(cell) => cell.get_data().await.map(ThreadRecord::Complete),
        }
    }

    // == Get Complete ==
    /// Returns the complete record for a thread.
    ///
    /// A cached summary is replaced by a new cell fetching the complete
    /// record; complete entries are never downgraded.
    pub async fn get_complete(&self, thread_id: &str) -> Result<CompleteThread> {
        let cell = {
            let mut entries = self.entries.write().await;
            match entries.get(thread_id).cloned() {
                Some(ThreadEntry::Complete(cell)) => cell,
                Some(ThreadEntry::Summary(_)) => {
                    info!(thread_id, "Promoting thread summary to complete");
                    let cell = self.complete_cell(thread_id, None);
                    self.insert(&mut entries, thread_id, ThreadEntry::Complete(cell.clone()));
                    entries.record_promotion();
                    cell
                }
                None => {
                    debug!(thread_id, "Caching complete thread");
                    let cell = self.complete_cell(thread_id, None);
                    self.insert(&mut entries, thread_id, ThreadEntry::Complete(cell.clone()));
                    cell
                }
            }
        };

        cell.get_data().await
    }

    /// Caches an already fetched complete thread, replacing any entry for it.
    pub async fn store_complete(&self, thread: CompleteThread) {
        let thread_id = thread.id.clone();
        let cell = self.complete_cell(&thread_id, Some(thread));
        let mut entries = self.entries.write().await;
        self.insert(&mut entries, &thread_id, ThreadEntry::Complete(cell));
    }

    /// Caches an already fetched summary unless the thread is cached complete.
    pub async fn store_summary(&self, summary: ThreadSummary) -> bool {
        let thread_id = summary.id.clone();
        let mut entries = self.entries.write().await;
        if let Some(ThreadEntry::Complete(_)) = entries.peek(&thread_id) {
            return false;
        }
        let cell = self.summary_cell(&thread_id, Some(summary));
        self.insert(&mut entries, &thread_id, ThreadEntry::Summary(cell));
        true
    }

    /// Reports which tier, if any, is cached for a thread. Does not count as
    /// an access.
    pub async fn state(&self, thread_id: &str) -> EntryState {
        self.entries
            .read()
            .await
            .peek(thread_id)
            .map_or(EntryState::Absent, |entry| entry.tier().into())
    }

    /// Marks a cached thread stale so the next read refetches it.
    pub async fn invalidate(&self, thread_id: &str) -> bool {
        match self.entries.read().await.peek(thread_id) {
            Some(entry) => {
                entry.invalidate();
                true
            }
            None => false,
        }
    }

    /// Extends the freshness of a cached thread when the upstream history id
    /// matches the cached one.
    ///
    /// Returns true if the entry was confirmed.
    pub async fn confirm_unchanged(&self, thread_id: &str, history_id: &str) -> bool {
        let entries = self.entries.read().await;
        match entries.peek(thread_id) {
            Some(entry) if entry.history_id().as_deref() == Some(history_id) => {
                debug!(thread_id, history_id, "Thread unchanged upstream");
                entry.refresh_expiry();
                true
            }
            _ => false,
        }
    }

    // == Remove ==
    /// Drops a thread from the cache. Returns true if it was cached.
    pub async fn remove(&self, thread_id: &str) -> bool {
        self.entries
            .write()
            .await
            .remove(thread_id)
            .is_some()
    }

    /// Number of cached threads across both tiers.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when no thread is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.entries.read().await.stats()
    }

    fn insert(
        &self,
        entries: &mut BoundedKeyedCache<String, ThreadEntry>,
        thread_id: &str,
        entry: ThreadEntry,
    ) {
        if let Some((evicted, _)) = entries.set(thread_id.to_string(), entry) {
            info!(thread_id = %evicted, "Evicted thread from cache");
        }
    }

    fn summary_cell(&self, thread_id: &str, preload: Option<ThreadSummary>) -> TtlCell<ThreadSummary> {
        let source = Arc::clone(&self.source);
        let parser = Arc::clone(&self.parser);
        let thread_id = thread_id.to_string();

        let builder = TtlCellBuilder::new(self.cell_config, move || {
            let source = Arc::clone(&source);
            let parser = Arc::clone(&parser);
            let thread_id = thread_id.clone();
            async move {
                let raw = source
                    .fetch_summary(&thread_id)
                    .await
                    .map_err(CacheError::fetch)?;
                Ok::<_, CacheError>(parser.summarize(raw))
            }
        });

        match preload {
            Some(summary) => builder.preload(summary).build(),
            None => builder.build(),
        }
    }

    fn complete_cell(&self, thread_id: &str, preload: Option<CompleteThread>) -> TtlCell<CompleteThread> {
        let source = Arc::clone(&self.source);
        let parser = Arc::clone(&self.parser);
        let thread_id = thread_id.to_string();

        let builder = TtlCellBuilder::new(self.cell_config, move || {
            let source = Arc::clone(&source);
            let parser = Arc::clone(&parser);
            let thread_id = thread_id.clone();
            async move {
                let raw = source
                    .fetch_complete(&thread_id)
                    .await
                    .map_err(CacheError::fetch)?;
                parser.complete(raw)
            }
        });

        match preload {
            Some(thread) => builder.preload(thread).build(),
            None => builder.build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::time::advance;

    use crate::thread::raw::{RawHeader, RawMessage, RawThread};
    use crate::thread::source::StaticThreadSource;

    fn raw_thread(id: &str, history_id: &str, message_count: usize) -> RawThread {
        RawThread {
            id: id.to_string(),
            history_id: history_id.to_string(),
            snippet: format!("snippet of {}", id),
            messages: (0..message_count)
                .map(|i| RawMessage {
                    id: format!("{}-m{}", id, i),
                    thread_id: id.to_string(),
                    internal_date: Some(format!("{}", 1_700_000_000_000u64 + i as u64)),
                    headers: vec![RawHeader::new("Subject", format!("Subject {}", id))],
                    body: Some(format!("body {}", i)),
                    ..RawMessage::default()
                })
                .collect(),
        }
    }

    fn setup(capacity: usize, threads: Vec<RawThread>) -> (Arc<StaticThreadSource>, TieredThreadCache) {
        let source = Arc::new(StaticThreadSource::new(threads));
        let cache = TieredThreadCache::with_cell_config(
            source.clone(),
            Arc::new(MessageParser::default()),
            capacity,
            CellConfig::new(Duration::from_secs(60)),
        )
        .unwrap();
        (source, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_caches_summary() {
        let (source, cache) = setup(10, vec![raw_thread("t1", "1", 2)]);

        let record = cache.get("t1").await.unwrap();
        assert_eq!(record.tier(), Tier::Summary);
        assert_eq!(cache.state("t1").await, EntryState::Summary);

        cache.get("t1").await.unwrap();
        assert_eq!(source.summary_calls(), 1);
        assert_eq!(source.complete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_fetches_complete_once() {
        let (source, cache) = setup(10, vec![raw_thread("t1", "1", 3)]);

        cache.get("t1").await.unwrap();
        let thread = cache.get_complete("t1").await.unwrap();

        assert_eq!(thread.messages.len(), 3);
        assert_eq!(cache.state("t1").await, EntryState::Complete);
        assert_eq!(source.complete_calls(), 1);

        let record = cache.get("t1").await.unwrap();
        assert_eq!(record.tier(), Tier::Complete);
        assert_eq!(source.complete_calls(), 1);
        assert_eq!(source.summary_calls(), 1);
        assert_eq!(cache.stats().await.promotions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_complete_on_absent_skips_summary() {
        let (source, cache) = setup(10, vec![raw_thread("t1", "1", 1)]);

        cache.get_complete("t1").await.unwrap();
        cache.get_complete("t1").await.unwrap();

        assert_eq!(source.summary_calls(), 0);
        assert_eq!(source.complete_calls(), 1);
        assert_eq!(cache.stats().await.promotions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_thread_complete_fetch_fails() {
        let (_, cache) = setup(10, vec![raw_thread("empty", "1", 0)]);

        let err = cache.get_complete("empty").await.unwrap_err();
        assert!(matches!(err, CacheError::EmptyThread(id) if id == "empty"));
        assert_eq!(cache.state("empty").await, EntryState::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_surfaces_as_fetch_failure() {
        let (_, cache) = setup(10, Vec::new());

        let err = cache.get("missing").await.unwrap_err();
        assert!(matches!(err, CacheError::Fetch(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_eviction_is_lru() {
        let threads = ["a", "b", "c", "d"]
            .iter()
            .map(|id| raw_thread(id, "1", 1))
            .collect();
        let (_, cache) = setup(3, threads);

        cache.get("a").await.unwrap();
        cache.get("b").await.unwrap();
        cache.get("c").await.unwrap();
        cache.get("a").await.unwrap();
        cache.get("d").await.unwrap();

        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.state("b").await, EntryState::Absent);
        assert_eq!(cache.state("a").await, EntryState::Summary);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_unchanged_extends_freshness() {
        let (source, cache) = setup(10, vec![raw_thread("t1", "5", 1)]);
        cache.get("t1").await.unwrap();

        advance(Duration::from_secs(50)).await;
        assert!(!cache.confirm_unchanged("t1", "6").await);
        assert!(cache.confirm_unchanged("t1", "5").await);
        advance(Duration::from_secs(50)).await;

        cache.get("t1").await.unwrap();
        assert_eq!(source.summary_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let (source, cache) = setup(10, vec![raw_thread("t1", "1", 1)]);
        cache.get("t1").await.unwrap();

        source.upsert(raw_thread("t1", "2", 1)).await;
        assert!(cache.invalidate("t1").await);
        assert!(!cache.invalidate("other").await);

        let record = cache.get("t1").await.unwrap();
        assert_eq!(record.history_id(), "2");
        assert_eq!(source.summary_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_complete_and_summary() {
        let (source, cache) = setup(10, vec![raw_thread("t1", "1", 2)]);
        let parser = MessageParser::default();

        let thread = parser.complete(raw_thread("t1", "1", 2)).unwrap();
        cache.store_complete(thread).await;
        assert!(!cache.store_summary(parser.summarize(raw_thread("t1", "1", 2))).await);

        let fetched = cache.get_complete("t1").await.unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(source.complete_calls(), 0);

        assert!(cache.store_summary(parser.summarize(raw_thread("t2", "1", 1))).await);
        assert_eq!(cache.state("t2").await, EntryState::Summary);
        assert!(cache.remove("t2").await);
        assert_eq!(cache.state("t2").await, EntryState::Absent);
    }

    #[test]
    fn test_oversized_window_rejected() {
        let result = TieredThreadCache::with_cell_config(
            Arc::new(StaticThreadSource::default()),
            Arc::new(MessageParser::default()),
            10,
            CellConfig::new(Duration::from_secs(60)).with_early_refresh(Duration::MAX),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let source = Arc::new(StaticThreadSource::default());
        let result = TieredThreadCache::with_cell_config(
            source,
            Arc::new(MessageParser::default()),
            0,
            CellConfig::default(),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }
}
