//! Viewport binder
//!
//! Scroll-position model of a vertical list. Elements are placed at an offset
//! with a height; scrolling reveals every observed element that comes within
//! its margin of the visible window.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::debug;

use crate::visibility::{Margin, VisibilityNotifier};

#[derive(Debug, Clone, Copy)]
struct Placement {
    offset: i64,
    height: u32,
}

#[derive(Debug)]
struct Watcher {
    margin: Margin,
    fire: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct ViewportState {
    top: i64,
    height: u32,
    placements: HashMap<String, Placement>,
    watchers: HashMap<String, Vec<Watcher>>,
}

impl ViewportState {
    fn within(&self, placement: Placement, margin: Margin) -> bool {
        let start = self.top - margin.px();
        let end = self.top + i64::from(self.height) + margin.px();
        let element_end = placement.offset + i64::from(placement.height);
        placement.offset <= end && element_end >= start
    }

    /// Forgets watchers whose observer went away before they fired.
    fn prune(&mut self) {
        self.watchers.retain(|_, watchers| {
            watchers.retain(|w| !w.fire.is_closed());
            !watchers.is_empty()
        });
    }

    /// Fires and drops every watcher of `id` whose margin now covers it.
    fn reveal(&mut self, id: &str) -> usize {
        let Some(placement) = self.placements.get(id).copied() else {
            return 0;
        };
        let Some(watchers) = self.watchers.remove(id) else {
            return 0;
        };

        let (ready, waiting): (Vec<_>, Vec<_>) = watchers
            .into_iter()
            .filter(|w| !w.fire.is_closed())
            .partition(|w| self.within(placement, w.margin));
        if !waiting.is_empty() {
            self.watchers.insert(id.to_string(), waiting);
        }

        let fired = ready.len();
        for watcher in ready {
            // A dropped receiver means the observer went away.
            let _ = watcher.fire.send(());
        }
        fired
    }
}

// == Viewport ==
/// Scrollable window over placed elements.
#[derive(Debug, Default)]
pub struct Viewport {
    state: Mutex<ViewportState>,
}

impl Viewport {
    // == Constructor ==
    /// Creates a viewport of `height` pixels scrolled to the top.
    pub fn new(height: u32) -> Self {
        Self {
            state: Mutex::new(ViewportState {
                height,
                ..ViewportState::default()
            }),
        }
    }

    // == Place ==
    /// Lays out element `id` at `offset` with `height`.
    ///
    /// Observers of an element that lands inside their margin fire at once.
    pub fn place(&self, id: impl Into<String>, offset: i64, height: u32) {
        let id = id.into();
        let mut state = self.lock();
        state.placements.insert(id.clone(), Placement { offset, height });
        state.reveal(&id);
    }

    // == Remove ==
    /// Removes element `id`; its pending observers never fire.
    pub fn remove(&self, id: &str) {
        let mut state = self.lock();
        state.placements.remove(id);
        state.watchers.remove(id);
    }

    // == Scroll ==
    /// Scrolls so the window starts at `top` and fires newly covered observers.
    ///
    /// Returns the number of notifications fired.
    pub fn scroll_to(&self, top: i64) -> usize {
        let mut state = self.lock();
        state.top = top;
        state.prune();
        let ids: Vec<String> = state.watchers.keys().cloned().collect();
        let fired: usize = ids.iter().map(|id| state.reveal(id)).sum();
        if fired > 0 {
            debug!(top, fired, "Viewport revealed elements");
        }
        fired
    }

    // == Resize ==
    /// Changes the window height and fires newly covered observers.
    pub fn resize(&self, height: u32) -> usize {
        let top = {
            let mut state = self.lock();
            state.height = height;
            state.top
        };
        self.scroll_to(top)
    }

    /// Number of live observations still waiting to fire.
    pub fn pending(&self) -> usize {
        let mut state = self.lock();
        state.prune();
        state.watchers.values().map(Vec::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, ViewportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VisibilityNotifier for Viewport {
    fn notify_once_visible(&self, id: &str, margin: Margin) -> BoxFuture<'static, ()> {
        let (fire, fired) = oneshot::channel();
        {
            let mut state = self.lock();
            state
                .watchers
                .entry(id.to_string())
                .or_default()
                .push(Watcher { margin, fire });
            state.reveal(id);
        }

        Box::pin(async move {
            if fired.await.is_err() {
                // Element removed or viewport gone: never visible.
                futures::future::pending::<()>().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_element_in_view_fires_immediately() {
        let viewport = Viewport::new(800);
        viewport.place("a", 100, 50);

        let mut fut = task::spawn(viewport.notify_once_visible("a", Margin(0)));

        assert_ready!(fut.poll());
        assert_eq!(viewport.pending(), 0);
    }

    #[test]
    fn test_scroll_reveals_within_margin() {
        let viewport = Viewport::new(800);
        viewport.place("far", 2_000, 100);

        let mut fut = task::spawn(viewport.notify_once_visible("far", Margin(200)));
        assert_pending!(fut.poll());

        // Window ends at 1_000 + 800 = 1_800; margin stretches it to 2_000.
        assert_eq!(viewport.scroll_to(1_000), 1);
        assert!(fut.is_woken());
        assert_ready!(fut.poll());
    }

    #[test]
    fn test_scroll_short_of_margin_stays_pending() {
        let viewport = Viewport::new(800);
        viewport.place("far", 2_000, 100);

        let mut fut = task::spawn(viewport.notify_once_visible("far", Margin(200)));

        assert_eq!(viewport.scroll_to(999), 0);
        assert_pending!(fut.poll());
        assert_eq!(viewport.pending(), 1);
    }

    #[test]
    fn test_fires_only_once() {
        let viewport = Viewport::new(800);
        viewport.place("a", 2_000, 100);
        let _fut = viewport.notify_once_visible("a", Margin(0));

        assert_eq!(viewport.scroll_to(1_500), 1);
        assert_eq!(viewport.scroll_to(0), 0);
        assert_eq!(viewport.scroll_to(1_500), 0);
    }

    #[test]
    fn test_unplaced_element_fires_when_placed_in_view() {
        let viewport = Viewport::new(800);

        let mut fut = task::spawn(viewport.notify_once_visible("late", Margin(0)));
        assert_pending!(fut.poll());

        viewport.place("late", 10, 10);
        assert_ready!(fut.poll());
    }

    #[test]
    fn test_removed_element_never_fires() {
        let viewport = Viewport::new(800);
        viewport.place("gone", 5_000, 100);
        let mut fut = task::spawn(viewport.notify_once_visible("gone", Margin(0)));

        viewport.remove("gone");
        viewport.scroll_to(5_000);

        assert_pending!(fut.poll());
        assert_pending!(fut.poll());
    }

    #[test]
    fn test_abandoned_observers_are_forgotten() {
        let viewport = Viewport::new(100);
        viewport.place("a", 5_000, 10);
        viewport.place("b", 6_000, 10);

        let kept = viewport.notify_once_visible("a", Margin(0));
        drop(viewport.notify_once_visible("a", Margin(0)));
        drop(viewport.notify_once_visible("b", Margin(0)));

        assert_eq!(viewport.pending(), 1);
        assert_eq!(viewport.scroll_to(5_000), 1);
        assert_eq!(viewport.pending(), 0);
        drop(kept);
    }

    #[test]
    fn test_resize_reveals() {
        let viewport = Viewport::new(100);
        viewport.place("a", 500, 10);
        let mut fut = task::spawn(viewport.notify_once_visible("a", Margin(0)));
        assert_pending!(fut.poll());

        assert_eq!(viewport.resize(600), 1);
        assert_ready!(fut.poll());
    }
}
