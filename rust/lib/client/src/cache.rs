//! Entity cache: named ERP collections held in memory.
//!
//! - `fetch(collection)` loads one collection; a second call while the
//!   first is in flight is a no-op.
//! - `get(collection)` reads the current snapshot (Arc clone, cheap).
//! - `invalidate(collection)` marks data stale; `refresh_stale()` reloads.
//! - `subscribe(topic, handler)` observes every state transition.
//!
//! Per collection the phase moves `Empty → Loading → {Populated | Errored}`,
//! and back to `Loading` on refresh or retry. A failed refresh keeps the
//! previous data, and so does a fetch dropped before it finished. Nothing
//! refreshes on its own: writers invalidate or refetch what they touched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collection::Collection;
use crate::error::ApiError;
use crate::http::ProxyClient;
use crate::record::Record;
use crate::session::TokenSource;

// ── Phase ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionPhase {
    #[default]
    Empty,
    Loading,
    Populated,
    Errored,
}

impl CollectionPhase {
    pub fn can_transition_to(self, next: CollectionPhase) -> bool {
        use CollectionPhase::*;
        matches!(
            (self, next),
            (Empty, Loading) | (Loading, Populated) | (Loading, Errored) | (Populated, Loading) | (Errored, Loading)
        )
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// What consumers read for one collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionSnapshot {
    pub phase: CollectionPhase,
    /// Last successfully fetched records. Survives failed refreshes.
    pub data: Arc<Vec<Record>>,
    pub error: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Set by `invalidate`, cleared by the next successful fetch.
    pub stale: bool,
}

impl CollectionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == CollectionPhase::Loading
    }

    pub fn find(&self, id: i64) -> Option<&Record> {
        self.data.iter().find(|r| r.id() == Some(id))
    }
}

/// Result of one `fetch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Request succeeded; the collection now holds `count` records.
    Fetched { count: usize },
    /// Request failed; message stored as the collection error.
    Failed(String),
    /// Another fetch for the same collection is still pending.
    AlreadyInFlight,
    /// Cache was closed or cleared while the request was pending; the
    /// result was dropped.
    Discarded,
}

// ── Subscriptions ───────────────────────────────────────────────────

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Collection(Collection),
    All,
}

impl Topic {
    fn matches(self, collection: Collection) -> bool {
        match self {
            Topic::All => true,
            Topic::Collection(c) => c == collection,
        }
    }
}

/// Handle returned by [`EntityCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback type for cache change notifications.
pub type ChangeHandler = Arc<dyn Fn(Collection, &CollectionSnapshot) + Send + Sync>;

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    topic: Topic,
    handler: ChangeHandler,
}

// ── PendingFetch ────────────────────────────────────────────────────

/// Held across the request in `fetch`. If the fetch ends without
/// applying a result (future dropped, cache closed), the collection
/// leaves `Loading` for `Errored` so the next `fetch` can start.
struct PendingFetch<'a> {
    cache: &'a EntityCache,
    collection: Collection,
    epoch: u64,
    settled: bool,
}

impl PendingFetch<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let collection = self.collection;
        let snapshot = {
            let mut entries = self.cache.entries.write().unwrap_or_else(PoisonError::into_inner);
            // After `clear` the entry belongs to a newer epoch.
            if self.cache.epoch.load(Ordering::SeqCst) != self.epoch {
                return;
            }
            match entries.get_mut(&collection) {
                Some(entry) if entry.phase == CollectionPhase::Loading => {
                    entry.phase = CollectionPhase::Errored;
                    entry.error = Some("request cancelled".to_string());
                    entry.clone()
                }
                _ => return,
            }
        };
        debug!("{collection}: fetch abandoned before completion");
        if !self.cache.is_closed() {
            self.cache.notify(collection, &snapshot);
        }
    }
}

// ── EntityCache ─────────────────────────────────────────────────────

pub struct EntityCache {
    client: ProxyClient,
    tokens: Arc<dyn TokenSource>,
    entries: RwLock<HashMap<Collection, CollectionSnapshot>>,
    handlers: RwLock<Vec<HandlerEntry>>,
    next_id: AtomicU64,
    /// Bumped by `clear`; results from an older epoch are dropped.
    epoch: AtomicU64,
    closed: AtomicBool,
}

impl EntityCache {
    pub fn new(client: ProxyClient, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            tokens,
            entries: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    // ====================================================================
    // Read
    // ====================================================================

    /// Current snapshot. Unknown collections read as `Empty`.
    pub fn get(&self, collection: Collection) -> CollectionSnapshot {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&collection).cloned().unwrap_or_default()
    }

    /// Records only.
    pub fn records(&self, collection: Collection) -> Arc<Vec<Record>> {
        self.get(collection).data
    }

    /// Collections that have been requested at least once, ordered.
    pub fn collections(&self) -> Vec<Collection> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<Collection> = entries.keys().copied().collect();
        names.sort();
        names
    }

    // ====================================================================
    // Fetch
    // ====================================================================

    /// Load `collection` from the proxy.
    pub async fn fetch(&self, collection: Collection) -> FetchOutcome {
        if self.is_closed() {
            return FetchOutcome::Discarded;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let started = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.entry(collection).or_default();
            if entry.phase == CollectionPhase::Loading {
                None
            } else {
                entry.phase = CollectionPhase::Loading;
                Some(entry.clone())
            }
        };
        let Some(loading) = started else {
            debug!("{collection}: fetch already in flight");
            return FetchOutcome::AlreadyInFlight;
        };
        let pending = PendingFetch {
            cache: self,
            collection,
            epoch,
            settled: false,
        };
        self.notify(collection, &loading);

        let result = self.request(collection).await;

        if self.is_closed() || self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("{collection}: dropping result of stale fetch");
            return FetchOutcome::Discarded;
        }
        pending.settle();

        let (snapshot, outcome) = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.entry(collection).or_default();
            let outcome = match result {
                Ok(records) => {
                    let count = records.len();
                    entry.phase = CollectionPhase::Populated;
                    entry.data = Arc::new(records);
                    entry.error = None;
                    entry.last_fetched_at = Some(Utc::now());
                    entry.stale = false;
                    info!("{collection}: fetched {count} records");
                    FetchOutcome::Fetched { count }
                }
                Err(e) => {
                    let msg = e.user_message();
                    warn!("{collection}: fetch failed: {e}");
                    entry.phase = CollectionPhase::Errored;
                    entry.error = Some(msg.clone());
                    FetchOutcome::Failed(msg)
                }
            };
            (entry.clone(), outcome)
        };
        self.notify(collection, &snapshot);
        outcome
    }

    async fn request(&self, collection: Collection) -> Result<Vec<Record>, ApiError> {
        let token = self
            .tokens
            .token()
            .await?
            .ok_or_else(|| ApiError::Auth("not signed in".into()))?;
        self.client.list(collection, &token, Value::Null).await
    }

    // ====================================================================
    // Invalidation
    // ====================================================================

    /// Mark a loaded collection stale. Data stays readable until the next
    /// successful fetch. Returns false if there was nothing to mark.
    pub fn invalidate(&self, collection: Collection) -> bool {
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries.get_mut(&collection) {
                Some(entry) if entry.phase != CollectionPhase::Empty => {
                    entry.stale = true;
                    entry.clone()
                }
                _ => return false,
            }
        };
        self.notify(collection, &snapshot);
        true
    }

    /// Refetch every stale collection, one after another.
    pub async fn refresh_stale(&self) -> Vec<(Collection, FetchOutcome)> {
        let stale: Vec<Collection> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            let mut names: Vec<Collection> = entries
                .iter()
                .filter(|(_, e)| e.stale)
                .map(|(c, _)| *c)
                .collect();
            names.sort();
            names
        };
        let mut outcomes = Vec::with_capacity(stale.len());
        for collection in stale {
            outcomes.push((collection, self.fetch(collection).await));
        }
        outcomes
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    /// Drop every collection. Pending fetches finish but are discarded.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let removed: Vec<Collection> = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.drain().map(|(c, _)| c).collect()
        };
        let empty = CollectionSnapshot::default();
        for collection in removed {
            self.notify(collection, &empty);
        }
    }

    /// Tear down: later fetches and any still pending are discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ====================================================================
    // Subscriptions
    // ====================================================================

    /// Register a change handler. It runs synchronously, outside any cache
    /// lock, after every transition of a matching collection.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(Collection, &CollectionSnapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push(HandlerEntry {
            id,
            topic,
            handler: Arc::new(handler),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.retain(|h| h.id != id);
    }

    fn notify(&self, collection: Collection, snapshot: &CollectionSnapshot) {
        let matched: Vec<HandlerEntry> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .filter(|h| h.topic.matches(collection))
                .cloned()
                .collect()
        };
        for entry in matched {
            (entry.handler)(collection, snapshot);
        }
    }
}
