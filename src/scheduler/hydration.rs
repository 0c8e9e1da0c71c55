//! Hydration handle
//!
//! One mounted consumer of photo lookups: it seeds its results from the
//! cache, requests the misses (now or once visible) and publishes each
//! outcome as it lands.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::Lookup;
use crate::error::HydrateError;
use crate::queue::Outcome;
use crate::scheduler::item::collect_keys;
use crate::scheduler::{Admission, HydrationItem, SchedulerContext};

/// Reactive output: key to photo URL, `None` when known to be absent.
pub type Results = HashMap<String, Option<String>>;

// == Hydration Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrationMode {
    /// Request every miss immediately; exempt from the session budget.
    Eager,
    /// Request a miss only once its element becomes visible.
    Lazy,
}

impl FromStr for HydrationMode {
    type Err = HydrateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eager" => Ok(HydrationMode::Eager),
            "lazy" => Ok(HydrationMode::Lazy),
            other => Err(HydrateError::InvalidConfig(format!(
                "unknown hydration mode: {other}"
            ))),
        }
    }
}

/// Shared state of one mounted hydration.
pub(crate) struct Instance {
    id: u64,
    ctx: Arc<SchedulerContext>,
    mode: HydrationMode,
    alive: AtomicBool,
    /// Keys in display order
    order: Mutex<Vec<String>>,
    /// Keys this instance has already looked at
    handled: Mutex<HashSet<String>>,
    results: watch::Sender<Results>,
    /// Lookups this instance admitted that have not reported back
    pending: watch::Sender<usize>,
}

impl Instance {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Registers `key` and serves it from cache when possible.
    ///
    /// Returns true when the key still needs a lookup by this instance.
    fn seed(&self, key: &str) -> bool {
        if !lock(&self.handled).insert(key.to_string()) {
            return false;
        }
        lock(&self.order).push(key.to_string());

        if let Lookup::Hit(value) = self.ctx.cache().get(key) {
            self.publish(key, value);
            return false;
        }

        // The cache just missed, so only an in-flight lookup owns the key.
        if self.ctx.ledger().is_owned(key, || false) {
            debug!(instance = self.id, key, "Key owned by another hydration");
            return false;
        }
        true
    }

    /// Asks for a lookup of `key` on behalf of this instance.
    ///
    /// The key already went through `seed`, which accounted for the read in
    /// the cache statistics, so the re-checks here peek.
    fn request_hydration(self: &Arc<Self>, key: &str) {
        if !self.is_alive() || self.ctx.is_disposed() {
            return;
        }

        // Warmed by another hydration since this one mounted.
        let cache = self.ctx.cache();
        if let Lookup::Hit(value) = cache.peek(key) {
            self.publish(key, value);
            return;
        }

        match self
            .ctx
            .ledger()
            .try_admit(key, self.mode, || cache.peek(key).is_hit())
        {
            Admission::Admitted => {
                self.pending.send_modify(|p| *p += 1);
                let on_complete = self.completion(key.to_string());
                if let Err(err) = self.ctx.queue().schedule(key, on_complete) {
                    warn!(instance = self.id, key, error = %err, "Could not schedule lookup");
                    self.ctx.ledger().settle(key);
                    self.pending.send_modify(|p| *p = p.saturating_sub(1));
                }
            }
            Admission::AlreadyOwned => {
                debug!(instance = self.id, key, "Lookup already owned");
            }
            Admission::BudgetExhausted => {
                debug!(instance = self.id, key, "Hydration budget exhausted, leaving placeholder");
            }
        }
    }

    /// Builds the completion for a lookup of `key`.
    ///
    /// Holds only weak references: an unmounted instance or disposed
    /// context simply drops the outcome. A lookup discarded by shutdown
    /// settles without publishing, leaving the placeholder in place.
    fn completion(self: &Arc<Self>, key: String) -> impl FnOnce(Outcome) + Send + 'static {
        let ctx = Arc::downgrade(&self.ctx);
        let instance: Weak<Instance> = Arc::downgrade(self);

        move |outcome| {
            if let Some(ctx) = ctx.upgrade() {
                ctx.ledger().settle(&key);
            }
            let Some(instance) = instance.upgrade() else {
                debug!(key = %key, "Dropping result for unmounted hydration");
                return;
            };
            instance.pending.send_modify(|p| *p = p.saturating_sub(1));
            match outcome {
                Outcome::Resolved(value) if instance.is_alive() => instance.publish(&key, value),
                Outcome::Resolved(_) => {
                    debug!(key = %key, "Dropping result for unmounted hydration")
                }
                Outcome::Dropped => debug!(key = %key, "Lookup discarded before it started"),
            }
        }
    }

    fn publish(&self, key: &str, value: Option<String>) {
        self.results.send_modify(|results| {
            results.insert(key.to_string(), value);
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Hydration ==
/// Handle to one mounted hydration.
///
/// Dropping the handle unmounts it: pending visibility waits are cancelled
/// and late lookup results are discarded.
pub struct Hydration {
    instance: Arc<Instance>,
    watchers: Mutex<JoinSet<()>>,
}

impl fmt::Debug for Hydration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hydration")
            .field("id", &self.instance.id)
            .field("mode", &self.instance.mode)
            .field("alive", &self.instance.is_alive())
            .finish_non_exhaustive()
    }
}

impl Hydration {
    pub(crate) fn mount(ctx: Arc<SchedulerContext>, id: u64, mode: HydrationMode) -> Self {
        let (results, _) = watch::channel(Results::new());
        let (pending, _) = watch::channel(0);
        Self {
            instance: Arc::new(Instance {
                id,
                ctx,
                mode,
                alive: AtomicBool::new(true),
                order: Mutex::new(Vec::new()),
                handled: Mutex::new(HashSet::new()),
                results,
                pending,
            }),
            watchers: Mutex::new(JoinSet::new()),
        }
    }

    // == Extend ==
    /// Adds `items` to this hydration, as a re-render with a new list would.
    ///
    /// Keys already seen by this instance are ignored, so calling this again
    /// with the same list never issues new lookups.
    pub fn extend<I>(&self, items: I)
    where
        I: IntoIterator,
        I::Item: HydrationItem,
    {
        if !self.instance.is_alive() {
            return;
        }

        let keys = collect_keys(items);
        let total = keys.len();
        let misses: Vec<String> = keys
            .into_iter()
            .filter(|key| self.instance.seed(key))
            .collect();

        debug!(
            instance = self.instance.id,
            mode = ?self.instance.mode,
            total,
            misses = misses.len(),
            "Hydrating items"
        );

        for key in misses {
            match self.instance.mode {
                HydrationMode::Eager => self.instance.request_hydration(&key),
                HydrationMode::Lazy => self.watch(key),
            }
        }
    }

    /// Waits for `key` to become visible, then requests it.
    fn watch(&self, key: String) {
        let ctx = &self.instance.ctx;
        let visible = ctx
            .visibility()
            .notify_once_visible(&key, ctx.visibility_margin());
        let instance = Arc::downgrade(&self.instance);

        let mut watchers = lock(&self.watchers);
        while watchers.try_join_next().is_some() {}
        watchers.spawn(async move {
            visible.await;
            if let Some(instance) = instance.upgrade() {
                debug!(instance = instance.id, key = %key, "Item became visible");
                instance.request_hydration(&key);
            }
        });
    }

    // == Results ==
    /// Returns a snapshot of every result published so far.
    pub fn results(&self) -> Results {
        self.instance.results.borrow().clone()
    }

    /// Returns `Some(value)` once `key` has an outcome; `Some(None)` means
    /// the item is known to have no photo.
    pub fn get(&self, key: &str) -> Option<Option<String>> {
        self.instance.results.borrow().get(key).cloned()
    }

    /// Returns the photo for `key`, or `fallback` while unknown or absent.
    pub fn photo_or(&self, key: &str, fallback: &str) -> String {
        self.get(key)
            .flatten()
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Returns every key in display order with its photo, if known.
    pub fn ordered(&self) -> Vec<(String, Option<String>)> {
        let results = self.instance.results.borrow();
        lock(&self.instance.order)
            .iter()
            .map(|key| (key.clone(), results.get(key).cloned().flatten()))
            .collect()
    }

    /// Subscribes to result updates.
    pub fn subscribe(&self) -> watch::Receiver<Results> {
        self.instance.results.subscribe()
    }

    /// Number of lookups this hydration is still waiting on.
    pub fn pending_lookups(&self) -> usize {
        *self.instance.pending.borrow()
    }

    // == Idle ==
    /// Resolves once no lookup admitted by this hydration is outstanding.
    ///
    /// Lazy keys that never became visible are not waited for.
    pub async fn idle(&self) {
        let mut pending = self.instance.pending.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = pending.wait_for(|p| *p == 0).await;
    }

    pub fn mode(&self) -> HydrationMode {
        self.instance.mode
    }

    pub fn is_mounted(&self) -> bool {
        self.instance.is_alive()
    }

    // == Unmount ==
    /// Stops this hydration; later results are dropped, never applied.
    pub fn unmount(&self) {
        if self.instance.alive.swap(false, Ordering::SeqCst) {
            lock(&self.watchers).abort_all();
            debug!(instance = self.instance.id, "Hydration unmounted");
        }
    }
}

impl Drop for Hydration {
    fn drop(&mut self) {
        self.unmount();
    }
}
