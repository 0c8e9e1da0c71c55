//! Hydration report
//!
//! Per-item outcome of a hydration plus session statistics, printed by the
//! command-line front end.

use serde::Serialize;

use crate::scheduler::{ContextStats, Hydration, HydrationMode, SchedulerContext};

/// Where an item's photo stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    /// A photo URL was found
    Resolved,
    /// The lookup finished without a photo
    Absent,
    /// No outcome yet (not visible, owned elsewhere or over budget)
    Unknown,
}

/// One item's line in the report.
#[derive(Debug, Clone, Serialize)]
pub struct ItemPhoto {
    /// Item key
    pub key: String,
    /// Photo URL, or the fallback when none is known
    pub photo: String,
    pub status: PhotoStatus,
}

/// Summary of a hydration.
#[derive(Debug, Clone, Serialize)]
pub struct HydrationReport {
    pub mode: HydrationMode,
    /// Items in display order
    pub items: Vec<ItemPhoto>,
    pub resolved: usize,
    pub absent: usize,
    pub unknown: usize,
    pub stats: ContextStats,
}

impl HydrationReport {
    /// Builds a report from the current state of `hydration`.
    ///
    /// Items without a photo show `fallback`.
    pub fn new(hydration: &Hydration, ctx: &SchedulerContext, fallback: &str) -> Self {
        let items: Vec<ItemPhoto> = hydration
            .ordered()
            .into_iter()
            .map(|(key, photo)| {
                let status = match hydration.get(&key) {
                    Some(Some(_)) => PhotoStatus::Resolved,
                    Some(None) => PhotoStatus::Absent,
                    None => PhotoStatus::Unknown,
                };
                ItemPhoto {
                    key,
                    photo: photo.unwrap_or_else(|| fallback.to_string()),
                    status,
                }
            })
            .collect();

        let count = |wanted: PhotoStatus| items.iter().filter(|i| i.status == wanted).count();

        Self {
            mode: hydration.mode(),
            resolved: count(PhotoStatus::Resolved),
            absent: count(PhotoStatus::Absent),
            unknown: count(PhotoStatus::Unknown),
            items,
            stats: ctx.stats(),
        }
    }
}
