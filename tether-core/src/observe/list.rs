//! Observed sequence container.
//!
//! Indices and the length are tracked separately. Growing the list invalidates
//! readers of the length; shrinking it invalidates readers of the length and of
//! every index that fell off the end.

use std::cell::RefCell;
use std::fmt;

use crate::error::{ReactiveError, Result};
use crate::reactive::{ContainerKind, Key, Runtime, Target, TargetHandle, TrackOp, TriggerEvent};
use crate::utils::has_changed;

pub struct ReactiveList<V> {
    handle: TargetHandle,
    items: RefCell<Vec<V>>,
}

impl<V> ReactiveList<V>
where
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::new_in(&Runtime::current())
    }

    pub fn new_in(runtime: &Runtime) -> Self {
        Self::from_vec_in(runtime, Vec::new())
    }

    pub fn from_vec_in(runtime: &Runtime, items: Vec<V>) -> Self {
        Self {
            handle: runtime.observe(ContainerKind::Sequence),
            items: RefCell::new(items),
        }
    }

    pub fn target(&self) -> Target {
        self.handle.target()
    }

    pub fn get(&self, index: usize) -> Option<V> {
        self.handle.track(TrackOp::Get, &Key::Index(index));
        self.items.borrow().get(index).cloned()
    }

    pub fn has(&self, index: usize) -> bool {
        self.handle.track(TrackOp::Has, &Key::Index(index));
        index < self.items.borrow().len()
    }

    pub fn len(&self) -> usize {
        self.handle.track(TrackOp::Get, &Key::Length);
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every item. Depends on the length, like any enumeration of a
    /// sequence, and on each index read.
    pub fn to_vec(&self) -> Vec<V> {
        self.handle.track(TrackOp::Iterate, &Key::Length);
        let len = self.items.borrow().len();
        for index in 0..len {
            self.handle.track(TrackOp::Get, &Key::Index(index));
        }
        self.items.borrow().clone()
    }

    /// Replace the item at `index`, returning the previous one.
    pub fn set(&self, index: usize, value: V) -> Result<V> {
        let (old, changed) = {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(ReactiveError::IndexOutOfBounds { index, len })?;
            let changed = has_changed(&value, &*slot);
            (std::mem::replace(slot, value), changed)
        };
        if changed {
            self.handle.trigger(TriggerEvent::set(index));
        }
        Ok(old)
    }

    pub fn push(&self, value: V) {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        self.handle.trigger(TriggerEvent::add(index));
    }

    pub fn pop(&self) -> Option<V> {
        let (popped, len) = {
            let mut items = self.items.borrow_mut();
            (items.pop(), items.len())
        };
        if popped.is_some() {
            self.handle.trigger(TriggerEvent::length(len));
        }
        popped
    }

    /// Shorten the list to `len` items. Does nothing if it is already shorter.
    pub fn truncate(&self, len: usize) {
        let shrunk = {
            let mut items = self.items.borrow_mut();
            let shrunk = len < items.len();
            items.truncate(len);
            shrunk
        };
        if shrunk {
            self.handle.trigger(TriggerEvent::length(len));
        }
    }

    pub fn clear(&self) {
        self.truncate(0);
    }
}

impl<V> Default for ReactiveList<V>
where
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for ReactiveList<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveList")
            .field("target", &self.handle.target())
            .field("items", &self.items.borrow())
            .finish()
    }
}
