//! Fetch Queue
//!
//! FIFO queue of pending lookups drained by a fixed pool of workers. The pool
//! size is the concurrency bound: a lookup only runs while a worker holds it.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::{HydrateError, Result};
use crate::resolver::{resolve_and_record, Resolver};

// == Outcome ==
/// What became of one scheduled lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The lookup ran and its result is cached; `None` means no photo.
    Resolved(Option<String>),
    /// The queue shut down before a worker picked the lookup up.
    Dropped,
}

/// Callback receiving the outcome of one lookup.
pub type Completion = Box<dyn FnOnce(Outcome) + Send + 'static>;

type SharedReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<QueuedRequest>>>;

// == Queued Request ==
/// A lookup waiting for a free worker.
pub struct QueuedRequest {
    /// Key to resolve
    pub key: String,
    /// Fired once with the outcome, after the cache write
    on_complete: Completion,
}

impl fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

// == Queue Stats ==
/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    /// Lookups currently running
    pub in_flight: usize,
    /// Lookups waiting for a worker
    pub queued: usize,
    /// Highest `in_flight` ever observed
    pub peak_in_flight: usize,
    /// Lookups handed to a worker so far
    pub dispatched: u64,
    /// Lookups that ran to completion
    pub completed: u64,
    /// Lookups discarded by shutdown before they started
    pub dropped: u64,
    /// Lookups whose resolver panicked
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    queued: AtomicUsize,
    peak_in_flight: AtomicUsize,
    dispatched: AtomicU64,
    completed: AtomicU64,
    dropped: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    fn dequeue(&self) {
        let _ = self
            .queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |q| Some(q.saturating_sub(1)));
    }

    fn begin(&self) {
        self.dequeue();
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn drop_queued(&self) {
        self.dequeue();
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Settles a request that will never run.
fn discard(request: QueuedRequest, counters: &Counters) {
    counters.drop_queued();
    debug!(key = %request.key, "Dropping queued lookup");
    (request.on_complete)(Outcome::Dropped);
}

// == Fetch Queue ==
/// Bounded-concurrency lookup queue.
///
/// Requests start in the order they were scheduled; once started they run
/// to completion, shutdown included. There is no priority and no
/// per-request cancellation.
pub struct FetchQueue {
    /// Sending half of the FIFO, None once shut down
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedRequest>>>,
    receiver: SharedReceiver,
    /// Set on shutdown; workers discard whatever they dequeue afterwards
    closed: Arc<AtomicBool>,
    counters: Arc<Counters>,
    max_concurrent: usize,
}

impl fmt::Debug for FetchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchQueue")
            .field("max_concurrent", &self.max_concurrent)
            .field("stats", &self.stats())
            .finish()
    }
}

impl FetchQueue {
    // == Start ==
    /// Spawns `max_concurrent` workers and returns the queue feeding them.
    ///
    /// Must be called from within a Tokio runtime. A zero bound is raised to
    /// one so the queue can always drain.
    pub fn start(
        max_concurrent: usize,
        resolver: Arc<dyn Resolver>,
        cache: Arc<CacheStore>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let counters = Arc::new(Counters::default());
        let closed = Arc::new(AtomicBool::new(false));

        for id in 0..max_concurrent {
            spawn_worker(
                id,
                receiver.clone(),
                closed.clone(),
                resolver.clone(),
                cache.clone(),
                counters.clone(),
            );
        }

        info!(max_concurrent, "Fetch queue started");

        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            closed,
            counters,
            max_concurrent,
        }
    }

    // == Schedule ==
    /// Appends a lookup for `key` to the tail of the queue.
    ///
    /// An idle worker picks it up immediately. `on_complete` fires exactly
    /// once: after the outcome has been written to the cache, or with
    /// `Outcome::Dropped` if shutdown discards the request first. Fails only
    /// when the queue has been shut down.
    pub fn schedule<F>(&self, key: impl Into<String>, on_complete: F) -> Result<()>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let request = QueuedRequest {
            key: key.into(),
            on_complete: Box::new(on_complete),
        };

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(HydrateError::QueueClosed);
        };

        debug!(key = %request.key, "Scheduling lookup");
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(request).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(HydrateError::QueueClosed);
        }
        Ok(())
    }

    // == Stats ==
    /// Returns the current queue statistics.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            queued: self.counters.queued.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::SeqCst),
            dispatched: self.counters.dispatched.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    // == Shutdown ==
    /// Stops accepting work.
    ///
    /// Lookups already running finish and are cached as usual. Lookups still
    /// waiting are discarded, each firing its callback with
    /// `Outcome::Dropped`. Workers exit once the FIFO is empty.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        self.closed.store(true, Ordering::SeqCst);
        drop(sender);

        let waiting = self.counters.queued.load(Ordering::SeqCst);

        // Busy workers do not hold the receiver, so the backlog drains here.
        // A worker that does hold it sees `closed` and discards the rest.
        if let Ok(mut receiver) = self.receiver.try_lock() {
            while let Ok(request) = receiver.try_recv() {
                discard(request, &self.counters);
            }
        }

        if waiting > 0 {
            warn!(dropped = waiting, "Fetch queue shut down with pending lookups");
        } else {
            info!("Fetch queue shut down");
        }
    }
}

impl Drop for FetchQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns one detached worker pulling requests off the shared FIFO.
///
/// The worker exits once the channel is closed and empty. Between requests it releases
/// its slot, so at most one lookup per worker is ever in flight. A panicking
/// resolver is recorded as a failed lookup and the worker carries on.
fn spawn_worker(
    id: usize,
    receiver: SharedReceiver,
    closed: Arc<AtomicBool>,
    resolver: Arc<dyn Resolver>,
    cache: Arc<CacheStore>,
    counters: Arc<Counters>,
) {
    tokio::spawn(async move {
        debug!(worker = id, "Fetch worker started");

        loop {
            let next = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            let Some(request) = next else {
                break;
            };

            if closed.load(Ordering::SeqCst) {
                discard(request, &counters);
                continue;
            }

            counters.begin();
            let lookup = AssertUnwindSafe(resolve_and_record(
                resolver.as_ref(),
                &cache,
                &request.key,
            ))
            .catch_unwind()
            .await;
            let value = match lookup {
                Ok(value) => value,
                Err(_) => {
                    warn!(worker = id, key = %request.key, "Resolver panicked, recording lookup as failed");
                    counters.panicked.fetch_add(1, Ordering::SeqCst);
                    cache.put(&request.key, None);
                    None
                }
            };
            counters.finish();

            debug!(worker = id, key = %request.key, found = value.is_some(), "Lookup complete");
            (request.on_complete)(Outcome::Resolved(value));
        }

        debug!(worker = id, "Fetch worker stopped");
    });
}
