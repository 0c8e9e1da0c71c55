//! Hydration Scheduler Module
//!
//! Decides, per item, whether to serve a photo from cache, request a lookup
//! or leave a placeholder. A session-wide ledger guarantees that concurrent
//! hydrations of the same key share one lookup, and caps how much lazy work
//! a session may start.

mod context;
mod hydration;
mod item;
mod ledger;

pub use context::{ContextStats, SchedulerContext, SchedulerContextBuilder};
pub use hydration::{Hydration, HydrationMode, Results};
pub use item::HydrationItem;
pub use ledger::{Admission, HydrationLedger, LedgerStats};
