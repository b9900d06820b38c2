//! Observed keyed containers.
//!
//! [`ReactiveRecord`] stores values under string keys. It is created either
//! record-like (plain named properties) or map-like; the category only changes
//! which enumeration sentinel its key listing depends on and which sentinels a
//! value replacement invalidates.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::{ContainerKind, Key, Runtime, Target, TargetHandle, TrackOp, TriggerEvent};
use crate::utils::has_changed;

/// A keyed container whose reads are tracked and whose writes trigger.
pub struct ReactiveRecord<V> {
    handle: TargetHandle,
    entries: RefCell<IndexMap<Rc<str>, V>>,
}

impl<V> ReactiveRecord<V>
where
    V: Clone + PartialEq,
{
    /// Create an empty record on the current thread's runtime.
    pub fn new() -> Self {
        Self::new_in(&Runtime::current())
    }

    pub fn new_in(runtime: &Runtime) -> Self {
        Self::with_kind(runtime, ContainerKind::Record)
    }

    /// Create an empty map-like container on `runtime`.
    pub fn map_in(runtime: &Runtime) -> Self {
        Self::with_kind(runtime, ContainerKind::Map)
    }

    fn with_kind(runtime: &Runtime, kind: ContainerKind) -> Self {
        Self {
            handle: runtime.observe(kind),
            entries: RefCell::new(IndexMap::new()),
        }
    }

    /// Seed initial entries without notifying anyone.
    pub fn with_entries<K, I>(self, entries: I) -> Self
    where
        K: Into<Rc<str>>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn target(&self) -> Target {
        self.handle.target()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.handle.track(TrackOp::Get, &Key::name(key));
        self.entries.borrow().get(key).cloned()
    }

    pub fn get_untracked(&self, key: &str) -> Option<V> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.handle.track(TrackOp::Has, &Key::name(key));
        self.entries.borrow().contains_key(key)
    }

    /// All keys, in insertion order.
    pub fn keys(&self) -> Vec<Rc<str>> {
        let sentinel = if self.handle.kind().is_map() {
            Key::MapKeyIterate
        } else {
            Key::Iterate
        };
        self.handle.track(TrackOp::Iterate, &sentinel);
        self.entries.borrow().keys().cloned().collect()
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> Vec<(Rc<str>, V)> {
        self.handle.track(TrackOp::Iterate, &Key::Iterate);
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (Rc::clone(k), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handle.track(TrackOp::Iterate, &Key::Iterate);
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `value` under `key`, returning the previous value.
    ///
    /// Adding a key triggers an add; replacing a value with an equal one
    /// triggers nothing.
    pub fn set(&self, key: impl Into<Rc<str>>, value: V) -> Option<V> {
        let key = key.into();
        let (old, changed) = {
            let mut entries = self.entries.borrow_mut();
            let changed = entries
                .get(&key)
                .map_or(true, |old| has_changed(&value, old));
            (entries.insert(Rc::clone(&key), value), changed)
        };
        match &old {
            None => self.handle.trigger(TriggerEvent::add(Key::Name(key))),
            Some(_) if changed => self.handle.trigger(TriggerEvent::set(Key::Name(key))),
            Some(_) => {}
        }
        old
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let old = self.entries.borrow_mut().shift_remove(key);
        if old.is_some() {
            self.handle.trigger(TriggerEvent::delete(Key::name(key)));
        }
        old
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let had_entries = {
            let mut entries = self.entries.borrow_mut();
            let had_entries = !entries.is_empty();
            entries.clear();
            had_entries
        };
        if had_entries {
            self.handle.trigger(TriggerEvent::clear());
        }
    }
}

impl<V> Default for ReactiveRecord<V>
where
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for ReactiveRecord<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveRecord")
            .field("target", &self.handle.target())
            .field("entries", &self.entries.borrow())
            .finish()
    }
}
