//! Tracking Context
//!
//! The tracking context records which effect is currently running, whether
//! reads should be tracked, and how deeply effect runs are nested.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context. An effect run saves the
//! previous active effect and tracking flag, installs itself, and restores
//! both on exit. The nesting depth selects a bit (`1 << depth`) that the
//! dependency sets use to tell nested runs apart.
//!
//! Tracking can also be paused and resumed explicitly. Those calls push the
//! previous flag onto a small stack so that pause/reset pairs nest.

use std::cell::{Cell, RefCell};

use super::effect::ReactiveEffect;

/// Depth bit for the given nesting depth, or 0 past the representable range.
pub(crate) fn depth_bit(depth: u32) -> u32 {
    1u32.checked_shl(depth).unwrap_or(0)
}

/// State saved when an effect run starts, restored when it ends.
#[derive(Debug)]
pub(crate) struct SavedFrame {
    pub parent: Option<ReactiveEffect>,
    pub should_track: bool,
}

#[derive(Debug)]
pub(crate) struct TrackingContext {
    active_effect: RefCell<Option<ReactiveEffect>>,
    should_track: Cell<bool>,
    track_stack: RefCell<Vec<bool>>,
    depth: Cell<u32>,
    track_op_bit: Cell<u32>,
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self {
            active_effect: RefCell::new(None),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            track_op_bit: Cell::new(1),
        }
    }
}

impl TrackingContext {
    pub fn active_effect(&self) -> Option<ReactiveEffect> {
        self.active_effect.borrow().clone()
    }

    pub fn is_active(&self, effect: &ReactiveEffect) -> bool {
        self.active_effect
            .borrow()
            .as_ref()
            .is_some_and(|active| active.ptr_eq(effect))
    }

    pub fn should_track(&self) -> bool {
        self.should_track.get()
    }

    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    pub fn track_op_bit(&self) -> u32 {
        self.track_op_bit.get()
    }

    /// Make `effect` the active effect one level deeper.
    pub fn enter(&self, effect: &ReactiveEffect) -> SavedFrame {
        let parent = self.active_effect.replace(Some(effect.clone()));
        let should_track = self.should_track.replace(true);
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        self.track_op_bit.set(depth_bit(depth));
        SavedFrame {
            parent,
            should_track,
        }
    }

    /// Undo the matching [`enter`](Self::enter).
    pub fn exit(&self, frame: SavedFrame) {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        self.track_op_bit.set(depth_bit(depth));
        *self.active_effect.borrow_mut() = frame.parent;
        self.should_track.set(frame.should_track);
    }

    pub fn pause_tracking(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(false);
    }

    pub fn enable_tracking(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(true);
    }

    pub fn reset_tracking(&self) {
        let last = self.track_stack.borrow_mut().pop();
        self.should_track.set(last.unwrap_or(true));
    }
}

/// Guard that resets tracking when dropped.
///
/// Returned by [`Runtime::pause_guard`](super::Runtime::pause_guard); keeps
/// the pause/reset pair balanced even if the guarded code panics.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingPause<'a> {
    context: &'a TrackingContext,
}

impl<'a> TrackingPause<'a> {
    pub(crate) fn new(context: &'a TrackingContext) -> Self {
        context.pause_tracking();
        Self { context }
    }
}

impl Drop for TrackingPause<'_> {
    fn drop(&mut self) {
        self.context.reset_tracking();
    }
}
