//! Viewport tracking and settle debouncing.
//!
//! The map surface fires a stream of raw move/zoom events while the user
//! drags or scrolls. The tracker coalesces each burst into a single
//! `settled` emission carrying only the final viewport; intermediate
//! viewports are dropped, never queued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use canopy_shared::geo::LngLatBounds;
use tokio::sync::mpsc;

/// Quiet period after the last raw event before a settle fires.
pub const DEBOUNCE_MS: u64 = 300;

/// The visible map region plus zoom. Transient: each update supersedes the
/// previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: LngLatBounds,
    pub zoom: f64,
}

struct TrackerInner {
    latest: Option<Viewport>,
    /// Bumped on every raw event and on cancel; a sleeping debounce task
    /// only emits if its generation is still current when it wakes.
    generation: u64,
    listener: Option<mpsc::UnboundedSender<Viewport>>,
}

/// Debounced viewport settle signal.
pub struct ViewportTracker {
    debounce: Duration,
    inner: Arc<Mutex<TrackerInner>>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::with_debounce(Duration::from_millis(DEBOUNCE_MS))
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            inner: Arc::new(Mutex::new(TrackerInner {
                latest: None,
                generation: 0,
                listener: None,
            })),
        }
    }

    /// Register the settle listener, replacing any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Viewport> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().listener = Some(tx);
        rx
    }

    /// Feed one raw move/zoom event. Restarts the quiet-period timer.
    pub fn on_map_event(&self, viewport: Viewport) {
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.latest = Some(viewport);
            inner.generation += 1;
            inner.generation
        };

        let inner = Arc::clone(&self.inner);
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let guard = inner.lock().unwrap();
            // A newer event or a cancel arrived while we slept
            if guard.generation != generation {
                return;
            }
            if let (Some(viewport), Some(listener)) = (guard.latest, &guard.listener) {
                tracing::debug!(zoom = viewport.zoom, "viewport settled");
                let _ = listener.send(viewport);
            }
        });
    }

    /// Last viewport fed in, settled or not.
    pub fn latest(&self) -> Option<Viewport> {
        self.inner.lock().unwrap().latest
    }

    /// Tear down: drops the listener and invalidates any pending debounce
    /// so nothing fires after shutdown.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.listener = None;
    }
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewportTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}
