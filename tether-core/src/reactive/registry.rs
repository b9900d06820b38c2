//! Dependency Registry
//!
//! Two-level mapping from container identity to key to [`Dep`]. The outer
//! level is keyed by [`ContainerId`], not by the container, so the registry
//! never extends a container's lifetime. Containers purge their entry when
//! their [`TargetHandle`](super::TargetHandle) is dropped.
//!
//! Dependency sets are created lazily on the first tracked read of a
//! `(container, key)` pair and are never destroyed individually, only
//! emptied.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::dep::Dep;
use super::ids::ContainerId;
use super::key::Key;

type KeyDeps = IndexMap<Key, Rc<Dep>>;

#[derive(Debug, Default)]
pub(crate) struct DepRegistry {
    targets: RefCell<HashMap<ContainerId, KeyDeps>>,
}

impl DepRegistry {
    /// Look up the set for `(target, key)`, creating both levels on demand.
    pub fn get_or_create(&self, target: ContainerId, key: &Key) -> Rc<Dep> {
        let mut targets = self.targets.borrow_mut();
        let deps = targets.entry(target).or_default();
        if let Some(dep) = deps.get(key) {
            return Rc::clone(dep);
        }
        let dep = Dep::new();
        deps.insert(key.clone(), Rc::clone(&dep));
        dep
    }

    pub fn get(&self, target: ContainerId, key: &Key) -> Option<Rc<Dep>> {
        self.targets
            .borrow()
            .get(&target)
            .and_then(|deps| deps.get(key).cloned())
    }

    /// Run `f` over the key map of `target`, if it was ever tracked.
    pub fn with_target<R>(&self, target: ContainerId, f: impl FnOnce(&KeyDeps) -> R) -> Option<R> {
        self.targets.borrow().get(&target).map(f)
    }

    /// Forget everything recorded for `target`.
    ///
    /// Effects keep their own references to the removed sets until their
    /// next run prunes them, so Invariant A between effects and sets holds.
    pub fn purge(&self, target: ContainerId) -> bool {
        self.targets.borrow_mut().remove(&target).is_some()
    }

    pub fn contains(&self, target: ContainerId) -> bool {
        self.targets.borrow().contains_key(&target)
    }

    pub fn len(&self) -> usize {
        self.targets.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_sets_lazily_and_reuses_them() {
        let registry = DepRegistry::default();
        let target = ContainerId::new();
        let key = Key::name("a");

        assert!(registry.get(target, &key).is_none());
        assert!(!registry.contains(target));

        let first = registry.get_or_create(target, &key);
        let second = registry.get_or_create(target, &key);
        assert!(Rc::ptr_eq(&first, &second));
        assert!(registry.contains(target));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_separate_sets() {
        let registry = DepRegistry::default();
        let target = ContainerId::new();

        let a = registry.get_or_create(target, &Key::name("a"));
        let b = registry.get_or_create(target, &Key::name("b"));
        assert!(!Rc::ptr_eq(&a, &b));

        let count = registry.with_target(target, |deps| deps.len());
        assert_eq!(count, Some(2));
    }

    #[test]
    fn purge_removes_target() {
        let registry = DepRegistry::default();
        let target = ContainerId::new();
        registry.get_or_create(target, &Key::Iterate);

        assert!(registry.purge(target));
        assert!(!registry.purge(target));
        assert!(registry.with_target(target, |_| ()).is_none());
    }
}
