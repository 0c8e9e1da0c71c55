//! Photo Hydrator - Lazy photo URL hydration for item listings
//!
//! Resolves one photo URL per item with bounded concurrency, a session cache
//! that retries failures sooner than it refreshes successes, and an optional
//! visibility gate so off-screen items are only fetched when scrolled near.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod resolver;
pub mod scheduler;
pub mod visibility;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{HydrateError, Result};
pub use resolver::{HttpResolver, Resolver};
pub use scheduler::{Hydration, HydrationItem, HydrationMode, SchedulerContext};
