//! Dependency Sets
//!
//! A [`Dep`] is the set of effects subscribed to one observed key. Next to
//! the membership it keeps two bitmasks, `was` and `new`, indexed by the
//! current effect nesting depth:
//!
//! - `was` bit set: the running effect was subscribed here before this run.
//! - `new` bit set: the running effect read this key during this run.
//!
//! At the end of a run, a set with `was` but not `new` is stale and the
//! effect is removed from it. This avoids clearing and rebuilding every
//! subscription on each run.
//!
//! Membership stores weak effect references keyed by [`EffectId`], so a set
//! never keeps an effect alive and never holds the same effect twice.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::effect::{ReactiveEffect, WeakEffect};
use super::ids::EffectId;

/// The dependency sets an effect is subscribed to.
pub(crate) type DepList = SmallVec<[Rc<Dep>; 4]>;

/// Per-depth staleness markers.
#[derive(Debug, Default)]
struct DepMarkers {
    was: Cell<u32>,
    new: Cell<u32>,
}

/// The set of effects subscribed to one observed key.
#[derive(Default)]
pub struct Dep {
    subscribers: RefCell<IndexMap<EffectId, WeakEffect>>,
    markers: DepMarkers,
}

impl Dep {
    /// Create an empty dependency set.
    ///
    /// Containers that keep their own hidden slot (such as a single-value
    /// cell) own a `Dep` directly instead of going through the registry.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of live subscribed effects.
    pub fn len(&self) -> usize {
        self.subscribers
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `effect` is subscribed to this set.
    pub fn contains(&self, effect: &ReactiveEffect) -> bool {
        self.contains_id(effect.id())
    }

    pub(crate) fn contains_id(&self, id: EffectId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn insert(&self, effect: &ReactiveEffect) {
        self.subscribers
            .borrow_mut()
            .insert(effect.id(), effect.downgrade());
    }

    pub(crate) fn remove(&self, id: EffectId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    /// Snapshot of the live subscribers, in subscription order.
    ///
    /// Entries whose effect has been dropped are discarded along the way.
    pub(crate) fn effects(&self) -> Vec<ReactiveEffect> {
        let mut subscribers = self.subscribers.borrow_mut();
        let mut live = Vec::with_capacity(subscribers.len());
        subscribers.retain(|_, weak| match ReactiveEffect::upgrade(weak) {
            Some(effect) => {
                live.push(effect);
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn was_tracked(&self, bit: u32) -> bool {
        self.markers.was.get() & bit > 0
    }

    pub(crate) fn new_tracked(&self, bit: u32) -> bool {
        self.markers.new.get() & bit > 0
    }

    pub(crate) fn mark_was_tracked(&self, bit: u32) {
        self.markers.was.set(self.markers.was.get() | bit);
    }

    pub(crate) fn mark_new_tracked(&self, bit: u32) {
        self.markers.new.set(self.markers.new.get() | bit);
    }

    fn clear_markers(&self, bit: u32) {
        self.markers.was.set(self.markers.was.get() & !bit);
        self.markers.new.set(self.markers.new.get() & !bit);
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("len", &self.len())
            .field("was", &self.markers.was.get())
            .field("new", &self.markers.new.get())
            .finish()
    }
}

/// Mark every set the effect is currently subscribed to as "was tracked"
/// at the given depth bit. Called right before the effect body runs.
pub(crate) fn init_dep_markers(deps: &DepList, bit: u32) {
    for dep in deps {
        dep.mark_was_tracked(bit);
    }
}

/// Drop subscriptions that were not renewed during the run that just ended,
/// then clear this depth's markers on every set the effect touched.
pub(crate) fn finalize_dep_markers(effect: EffectId, deps: &mut DepList, bit: u32) {
    deps.retain(|dep| {
        let stale = dep.was_tracked(bit) && !dep.new_tracked(bit);
        if stale {
            dep.remove(effect);
        }
        dep.clear_markers(bit);
        !stale
    });
}
