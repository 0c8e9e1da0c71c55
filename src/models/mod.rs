//! Output models for the hydrator
//!
//! Serializable summaries of a finished hydration.

pub mod report;

// Re-export commonly used types
pub use report::{HydrationReport, ItemPhoto, PhotoStatus};
