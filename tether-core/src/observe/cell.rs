//! Single-value observable cell.
//!
//! A cell owns its dependency set directly instead of registering with the
//! registry, and reuses the runtime's track/trigger primitives for it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::reactive::{Dep, Runtime};
use crate::utils::has_changed;

pub struct ReactiveCell<T> {
    value: RefCell<T>,
    dep: Rc<Dep>,
    runtime: Runtime,
}

impl<T> ReactiveCell<T>
where
    T: Clone + PartialEq,
{
    pub fn new(value: T) -> Self {
        Self::new_in(&Runtime::current(), value)
    }

    pub fn new_in(runtime: &Runtime, value: T) -> Self {
        Self {
            value: RefCell::new(value),
            dep: Dep::new(),
            runtime: runtime.clone(),
        }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.runtime.track_dep(&self.dep);
        self.value.borrow().clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.runtime.track_dep(&self.dep);
        f(&self.value.borrow())
    }

    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value. Writing an equal value does nothing.
    pub fn set(&self, value: T) {
        let changed = has_changed(&value, &*self.value.borrow());
        if changed {
            *self.value.borrow_mut() = value;
            self.runtime.trigger_dep(&self.dep);
        }
    }

    /// Update the value using a function of the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let new_value = f(&self.value.borrow());
        self.set(new_value);
    }

    /// Number of effects currently subscribed to the cell.
    pub fn subscriber_count(&self) -> usize {
        self.dep.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveCell")
            .field("value", &self.value.borrow())
            .field("subscriber_count", &self.dep.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn cell_get_and_set() {
        let runtime = Runtime::new();
        let cell = ReactiveCell::new_in(&runtime, 0);
        assert_eq!(cell.get(), 0);

        cell.set(42);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn cell_update() {
        let runtime = Runtime::new();
        let cell = ReactiveCell::new_in(&runtime, 10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get_untracked(), 15);
    }

    #[test]
    fn cell_reruns_readers_on_change_only() {
        let runtime = Runtime::new();
        let cell = Rc::new(ReactiveCell::new_in(&runtime, 1));
        let seen = Rc::new(Cell::new(0));
        let (c, s) = (cell.clone(), seen.clone());

        let runner = runtime.effect(move || s.set(c.get()));
        assert_eq!(cell.subscriber_count(), 1);

        cell.set(1);
        cell.set(7);
        assert_eq!(seen.get(), 7);

        runner.stop();
        assert_eq!(cell.subscriber_count(), 0);
        cell.set(9);
        assert_eq!(seen.get(), 7);
    }
}
