//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::cache::{CacheStore, ManualClock, MemoryStore};
use crate::resolver::Resolver;

pub(crate) const SUCCESS_TTL_MS: u64 = 60_000;
pub(crate) const FAILED_TTL_MS: u64 = 5_000;
pub(crate) const STORAGE_PREFIX: &str = "photo-cache:";

/// Cache over in-memory storage, with handles on the storage and the clock.
pub(crate) fn create_store() -> (CacheStore, Arc<MemoryStore>, ManualClock) {
    let storage = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(1_000_000);
    let store = CacheStore::new(
        storage.clone(),
        Arc::new(clock.clone()),
        STORAGE_PREFIX,
        SUCCESS_TTL_MS,
        FAILED_TTL_MS,
    );
    (store, storage, clock)
}

pub(crate) fn create_cache() -> CacheStore {
    create_store().0
}

/// Polls `cond` until it holds, failing the test after five seconds.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Resolver that records every call and either waits for an explicit
/// release per key or sleeps a fixed delay.
pub(crate) struct GatedResolver {
    started: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedResolver {
    /// Every lookup blocks until `release(key)`.
    pub(crate) fn new() -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            failing: HashSet::new(),
            delay: None,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Every lookup completes after `delay`.
    pub(crate) fn open_after(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Lookups for `keys` resolve to None.
    pub(crate) fn failing(mut self, keys: &[&str]) -> Self {
        self.failing = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub(crate) fn release(&self, key: &str) {
        self.gate(key).notify_one();
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, key: &str) -> usize {
        self.started().iter().filter(|k| *k == key).count()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn gate(&self, key: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl Resolver for GatedResolver {
    async fn resolve(&self, key: &str) -> Option<String> {
        self.started.lock().unwrap().push(key.to_string());
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => self.gate(key).notified().await,
        }

        self.current.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(key) {
            None
        } else {
            Some(format!("https://cdn.example.com/{key}.jpg"))
        }
    }
}
