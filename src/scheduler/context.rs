//! Scheduler Context
//!
//! Everything hydrations share for one page session: the cache, the fetch
//! queue, the admission ledger and the visibility source. Create one per
//! session and dispose of it on teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cache::{CacheStats, CacheStore, Clock, KeyValueStore, MemoryStore, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::queue::{FetchQueue, QueueStats};
use crate::resolver::Resolver;
use crate::scheduler::{Hydration, HydrationItem, HydrationLedger, HydrationMode, LedgerStats};
use crate::visibility::{Margin, NeverVisible, VisibilityNotifier};

// == Context Stats ==
/// Combined statistics of one session.
#[derive(Debug, Clone, Serialize)]
pub struct ContextStats {
    pub cache: CacheStats,
    pub queue: QueueStats,
    pub ledger: LedgerStats,
}

// == Scheduler Context ==
pub struct SchedulerContext {
    config: Config,
    cache: Arc<CacheStore>,
    queue: FetchQueue,
    ledger: HydrationLedger,
    visibility: Arc<dyn VisibilityNotifier>,
    next_instance: AtomicU64,
    disposed: AtomicBool,
}

impl fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("ledger", &self.ledger)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl SchedulerContext {
    // == Create ==
    /// Creates a context with in-memory storage, the system clock and no
    /// visibility source.
    pub fn create(config: Config, resolver: Arc<dyn Resolver>) -> Result<Arc<Self>> {
        Self::builder(config, resolver).create()
    }

    /// Starts a builder for a context with custom capabilities.
    pub fn builder(config: Config, resolver: Arc<dyn Resolver>) -> SchedulerContextBuilder {
        SchedulerContextBuilder {
            config,
            resolver,
            storage: None,
            clock: None,
            visibility: None,
        }
    }

    // == Hydrate ==
    /// Mounts a new hydration for `items`.
    ///
    /// Cache hits are published before this returns. In eager mode every
    /// remaining key is requested immediately; in lazy mode each waits for
    /// its element to become visible. Lazy mode must be called from within
    /// a Tokio runtime.
    pub fn hydrate<I>(self: &Arc<Self>, items: I, mode: HydrationMode) -> Hydration
    where
        I: IntoIterator,
        I::Item: HydrationItem,
    {
        let id = self.next_instance.fetch_add(1, Ordering::SeqCst);
        let hydration = Hydration::mount(self.clone(), id, mode);
        hydration.extend(items);
        hydration
    }

    // == Dispose ==
    /// Tears the session down: no new lookups start and queued ones are dropped.
    ///
    /// Lookups already running finish and land in the cache and their
    /// hydrations; dropped ones are released from the ledger. Mounted
    /// hydrations keep serving what they already have.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.shutdown();
        let ledger = self.ledger.stats();
        info!(
            hydrations = ledger.hydration_count,
            keys = ledger.hydrated_keys,
            "Scheduler context disposed"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn ledger(&self) -> &HydrationLedger {
        &self.ledger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn queue(&self) -> &FetchQueue {
        &self.queue
    }

    pub(crate) fn visibility(&self) -> &dyn VisibilityNotifier {
        self.visibility.as_ref()
    }

    pub(crate) fn visibility_margin(&self) -> Margin {
        Margin(self.config.visibility_margin)
    }

    // == Stats ==
    pub fn stats(&self) -> ContextStats {
        ContextStats {
            cache: self.cache.snapshot_stats(),
            queue: self.queue.stats(),
            ledger: self.ledger.stats(),
        }
    }
}

// == Builder ==
pub struct SchedulerContextBuilder {
    config: Config,
    resolver: Arc<dyn Resolver>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    visibility: Option<Arc<dyn VisibilityNotifier>>,
}

impl SchedulerContextBuilder {
    /// Backing storage for the cache (default: in-memory).
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Time source for cache entries (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Visibility source for lazy hydration (default: nothing becomes visible).
    pub fn visibility(mut self, visibility: Arc<dyn VisibilityNotifier>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    // == Create ==
    /// Validates the configuration and starts the fetch workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(self) -> Result<Arc<SchedulerContext>> {
        self.config.validate()?;

        let storage: Arc<dyn KeyValueStore> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryStore::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let visibility: Arc<dyn VisibilityNotifier> = match self.visibility {
            Some(visibility) => visibility,
            None => Arc::new(NeverVisible),
        };

        let cache = Arc::new(CacheStore::from_config(&self.config, storage, clock));
        let queue = FetchQueue::start(self.config.max_concurrent, self.resolver, cache.clone());
        let ledger = HydrationLedger::new(self.config.max_hydrate_limit);

        info!(
            max_concurrent = self.config.max_concurrent,
            max_hydrate_limit = self.config.max_hydrate_limit,
            success_ttl = self.config.success_ttl,
            failed_ttl = self.config.failed_ttl,
            "Scheduler context created"
        );

        Ok(Arc::new(SchedulerContext {
            config: self.config,
            cache,
            queue,
            ledger,
            visibility,
            next_instance: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
        }))
    }
}
