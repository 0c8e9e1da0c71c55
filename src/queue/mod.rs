//! Fetch Queue Module
//!
//! Background workers that run lookups with bounded concurrency.
//!
//! # Tasks
//! - Fetch workers: pull queued lookups in FIFO order, resolve them, record
//!   the outcome in the cache, then notify the requester

mod fetch_queue;

pub use fetch_queue::{Completion, FetchQueue, Outcome, QueueStats, QueuedRequest};
