//! Pointer/touch interaction mediation.
//!
//! Turns low-level pointer events on the rendered map into popup, add, and
//! remove intents. A drag guard discriminates clicks from drags the same way
//! the map surface pans: movement beyond a small threshold between down and
//! up means the up event is drag-derived and must not fire tap semantics.

use std::time::{Duration, Instant};

use canopy_shared::geo::LngLat;

/// Movement below this is a click, not a drag.
pub const DRAG_THRESHOLD_PX: f64 = 3.0;

/// Touch drag threshold, larger because touch is less precise.
pub const TOUCH_DRAG_THRESHOLD_PX: f64 = 8.0;

/// Second tap must land within this window to count as a double-tap.
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(200);

/// ...and within this many pixels of the first tap.
pub const DOUBLE_TAP_TOLERANCE_PX: f64 = 10.0;

/// Tap-opened popups expire after this long; hover popups close on leave.
pub const TAP_POPUP_TIMEOUT: Duration = Duration::from_secs(4);

/// What the pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerTarget {
    Feature(u64),
    Cluster(u64),
    Empty,
}

/// Intent produced by the mediator for the host to act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediatorAction {
    OpenPopup(u64),
    ClosePopup,
    /// Double-tap on empty map: open the add workflow at this location.
    BeginAdd(LngLat),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PopupSource {
    Hover,
    Tap,
}

#[derive(Debug, Clone, Copy)]
struct Popup {
    feature_id: u64,
    source: PopupSource,
    opened_at: Instant,
}

#[derive(Debug, Default)]
pub struct InteractionMediator {
    popup: Option<Popup>,
    last_tap: Option<((f64, f64), Instant)>,
    pending_add: Option<LngLat>,
    remove_prompt: Option<u64>,
    drag_origin: Option<(f64, f64)>,
    drag_threshold: f64,
    did_drag: bool,
}

impl InteractionMediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn popup(&self) -> Option<u64> {
        self.popup.map(|p| p.feature_id)
    }

    /// Location captured by the last double-tap, if the add workflow is open.
    pub fn pending_add(&self) -> Option<LngLat> {
        self.pending_add
    }

    pub fn remove_prompt(&self) -> Option<u64> {
        self.remove_prompt
    }

    // --- hover ---

    /// Pointer entered a rendered point. Re-entering the feature whose popup
    /// is already open is a no-op so the popup does not flicker.
    pub fn pointer_enter(&mut self, feature_id: u64, now: Instant) -> Option<MediatorAction> {
        if self.popup.map(|p| p.feature_id) == Some(feature_id) {
            return None;
        }
        self.popup = Some(Popup {
            feature_id,
            source: PopupSource::Hover,
            opened_at: now,
        });
        Some(MediatorAction::OpenPopup(feature_id))
    }

    pub fn pointer_leave(&mut self, feature_id: u64) -> Option<MediatorAction> {
        match self.popup {
            Some(p) if p.feature_id == feature_id && p.source == PopupSource::Hover => {
                self.popup = None;
                Some(MediatorAction::ClosePopup)
            }
            _ => None,
        }
    }

    // --- drag guard ---

    pub fn pointer_down(&mut self, px: (f64, f64), touch: bool) {
        self.drag_origin = Some(px);
        self.did_drag = false;
        self.drag_threshold = if touch {
            TOUCH_DRAG_THRESHOLD_PX
        } else {
            DRAG_THRESHOLD_PX
        };
    }

    pub fn pointer_move(&mut self, px: (f64, f64)) {
        if let Some(origin) = self.drag_origin {
            if !self.did_drag && distance(origin, px) > self.drag_threshold {
                self.did_drag = true;
            }
        }
    }

    /// Pointer released. Drag-derived ups are swallowed; everything else is
    /// a tap.
    pub fn pointer_up(
        &mut self,
        px: (f64, f64),
        target: PointerTarget,
        location: LngLat,
        now: Instant,
    ) -> Option<MediatorAction> {
        let was_drag = self.did_drag;
        self.drag_origin = None;
        self.did_drag = false;
        if was_drag {
            return None;
        }
        self.tap(px, target, location, now)
    }

    // --- taps ---

    /// A confirmed (non-drag) tap.
    pub fn tap(
        &mut self,
        px: (f64, f64),
        target: PointerTarget,
        location: LngLat,
        now: Instant,
    ) -> Option<MediatorAction> {
        match target {
            PointerTarget::Feature(feature_id) => {
                // Feature taps never count toward the add gesture
                self.last_tap = None;
                if self.popup.map(|p| p.feature_id) == Some(feature_id) {
                    return None;
                }
                self.popup = Some(Popup {
                    feature_id,
                    source: PopupSource::Tap,
                    opened_at: now,
                });
                Some(MediatorAction::OpenPopup(feature_id))
            }
            PointerTarget::Cluster(_) => {
                self.last_tap = None;
                self.close_popup()
            }
            PointerTarget::Empty => {
                if self.popup.is_some() {
                    // Tap elsewhere closes a tap popup; this tap still seeds
                    // the double-tap detector
                    self.last_tap = Some((px, now));
                    return self.close_popup();
                }
                if let Some((first_px, first_at)) = self.last_tap {
                    let within_window = now.duration_since(first_at) <= DOUBLE_TAP_WINDOW;
                    let within_tolerance = distance(first_px, px) <= DOUBLE_TAP_TOLERANCE_PX;
                    if within_window && within_tolerance {
                        self.last_tap = None;
                        self.pending_add = Some(location);
                        return Some(MediatorAction::BeginAdd(location));
                    }
                }
                // Too slow or too far: this tap becomes the new "last tap"
                self.last_tap = Some((px, now));
                None
            }
        }
    }

    /// Close a tap-opened popup that has outlived its timeout. The host
    /// calls this on a coarse timer.
    pub fn expire_popup(&mut self, now: Instant) -> Option<MediatorAction> {
        match self.popup {
            Some(p)
                if p.source == PopupSource::Tap
                    && now.duration_since(p.opened_at) >= TAP_POPUP_TIMEOUT =>
            {
                self.popup = None;
                Some(MediatorAction::ClosePopup)
            }
            _ => None,
        }
    }

    // --- remove confirmation ---

    /// User asked to remove a feature (e.g. from its popup). Arms the
    /// confirmation prompt; nothing reaches the backend yet.
    pub fn request_remove(&mut self, feature_id: u64) {
        self.remove_prompt = Some(feature_id);
    }

    /// User confirmed with their identity: returns the feature to remove.
    /// The actor is validated downstream by the edit coordinator.
    pub fn confirm_remove(&mut self) -> Option<u64> {
        self.remove_prompt.take()
    }

    /// Declining the prompt is a no-op, not an error.
    pub fn decline_remove(&mut self) {
        self.remove_prompt = None;
    }

    // --- cancellation ---

    /// Explicit cancel (Escape, teardown): closes any popup and discards
    /// in-progress add coordinates and prompts.
    pub fn cancel(&mut self) -> Option<MediatorAction> {
        self.last_tap = None;
        self.pending_add = None;
        self.remove_prompt = None;
        self.drag_origin = None;
        self.did_drag = false;
        self.close_popup()
    }

    fn close_popup(&mut self) -> Option<MediatorAction> {
        if self.popup.take().is_some() {
            Some(MediatorAction::ClosePopup)
        } else {
            None
        }
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}
