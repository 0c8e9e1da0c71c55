//! Visibility Module
//!
//! One-shot "element became visible" notifications used by lazy hydration.
//! A notification fires at most once per observation; one that never fires
//! simply leaves its key unhydrated.

mod viewport;

use futures::future::{self, BoxFuture};

pub use viewport::Viewport;

// == Margin ==
/// Distance, in pixels, before an element enters the viewport at which it
/// already counts as visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Margin(pub u32);

impl Margin {
    pub fn px(self) -> i64 {
        i64::from(self.0)
    }
}

// == Visibility Notifier ==
/// Source of one-shot visibility events, keyed by element id.
pub trait VisibilityNotifier: Send + Sync {
    /// Resolves once the element `id` comes within `margin` of the viewport.
    ///
    /// The future may never resolve; callers must tolerate that.
    fn notify_once_visible(&self, id: &str, margin: Margin) -> BoxFuture<'static, ()>;
}

// == Never Visible ==
/// Notifier for hosts without a viewport: nothing ever becomes visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverVisible;

impl VisibilityNotifier for NeverVisible {
    fn notify_once_visible(&self, _id: &str, _margin: Margin) -> BoxFuture<'static, ()> {
        Box::pin(future::pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, task};

    #[test]
    fn test_never_visible_stays_pending() {
        let mut fut = task::spawn(NeverVisible.notify_once_visible("a", Margin(200)));
        assert_pending!(fut.poll());
    }

    #[test]
    fn test_margin_px() {
        assert_eq!(Margin(200).px(), 200);
        assert_eq!(Margin::default().px(), 0);
    }
}
