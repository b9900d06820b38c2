//! Reactive Runtime
//!
//! The runtime connects observed data to effects. It owns one tracking
//! context and one dependency registry, and exposes the two operations the
//! interception layer calls:
//!
//! - [`Runtime::track`] on every read, recording that the active effect
//!   depends on `(container, key)`.
//! - [`Runtime::trigger`] on every write, collecting the affected dependency
//!   sets and re-running (or scheduling) each subscribed effect once.
//!
//! # Independent Graphs
//!
//! A `Runtime` is a cheap handle; clones share the same graph. Separate
//! runtimes never see each other's effects or containers. Each thread also
//! has a default runtime, returned by [`Runtime::current`], which the
//! crate-level free functions use.
//!
//! # Threading
//!
//! Everything here is single-threaded. Effects run synchronously and nest
//! on the call stack; no locking is involved.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use super::context::{TrackingContext, TrackingPause};
use super::dep::Dep;
use super::effect::{EffectFn, EffectOptions, EffectRunner, ReactiveEffect};
use super::ids::{ContainerId, EffectId};
use super::key::{ContainerKind, Key, TrackOp, TriggerEvent, TriggerOp};
use super::registry::DepRegistry;
use crate::config::RuntimeConfig;
use crate::error::Result;

thread_local! {
    static CURRENT: Runtime = Runtime::new();
}

/// An observed container as seen by the engine: its identity and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub id: ContainerId,
    pub kind: ContainerKind,
}

/// Registration of an observed container with a runtime.
///
/// Dropping the handle forgets every dependency recorded for the container.
pub struct TargetHandle {
    target: Target,
    runtime: Runtime,
}

impl TargetHandle {
    pub fn target(&self) -> Target {
        self.target
    }

    pub fn id(&self) -> ContainerId {
        self.target.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.target.kind
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Shorthand for [`Runtime::track`] on this container.
    pub fn track(&self, op: TrackOp, key: &Key) {
        self.runtime.track(self.target, op, key);
    }

    /// Shorthand for [`Runtime::trigger`] on this container.
    pub fn trigger(&self, event: TriggerEvent) {
        self.runtime.trigger(self.target, event);
    }
}

impl Drop for TargetHandle {
    fn drop(&mut self) {
        if self.runtime.0.registry.purge(self.target.id) {
            trace!(target_id = self.target.id.raw(), "purged registry entry");
        }
    }
}

impl fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetHandle")
            .field("target", &self.target)
            .finish()
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    context: TrackingContext,
    registry: DepRegistry,
}

/// Handle to one reactive graph.
#[derive(Clone)]
pub struct Runtime(Rc<RuntimeInner>);

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(RuntimeConfig::default())
    }

    /// Create a runtime with a custom configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: RuntimeConfig) -> Self {
        Self(Rc::new(RuntimeInner {
            config,
            context: TrackingContext::default(),
            registry: DepRegistry::default(),
        }))
    }

    /// The default runtime of the calling thread.
    pub fn current() -> Self {
        CURRENT.with(Runtime::clone)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.0.config
    }

    pub(crate) fn context(&self) -> &TrackingContext {
        &self.0.context
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    /// Register a new container of the given category.
    pub fn observe(&self, kind: ContainerKind) -> TargetHandle {
        TargetHandle {
            target: Target {
                id: ContainerId::new(),
                kind,
            },
            runtime: self.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Create an effect with default options and run it once.
    pub fn effect(&self, f: impl Fn() + 'static) -> EffectRunner {
        self.effect_fn(EffectFn::new(f), EffectOptions::default())
    }

    pub fn effect_with(&self, f: impl Fn() + 'static, options: EffectOptions) -> EffectRunner {
        self.effect_fn(EffectFn::new(f), options)
    }

    /// Create an effect around an existing body.
    ///
    /// Passing a runner's [`body`](EffectRunner::body) reuses that closure
    /// instead of wrapping the runner.
    pub fn effect_fn(&self, body: EffectFn, options: EffectOptions) -> EffectRunner {
        let effect = ReactiveEffect::new(self.clone(), body, &options);
        if let Some(scope) = &options.scope {
            if scope.is_active() {
                scope.record(&effect);
            }
        }
        if !options.lazy {
            effect.run();
        }
        EffectRunner::new(effect)
    }

    pub fn stop(&self, runner: &EffectRunner) {
        runner.stop();
    }

    // ------------------------------------------------------------------
    // Tracking state
    // ------------------------------------------------------------------

    /// Whether a read right now would be tracked.
    pub fn is_tracking(&self) -> bool {
        self.0.context.should_track() && self.0.context.active_effect().is_some()
    }

    pub fn active_effect(&self) -> Option<ReactiveEffect> {
        self.0.context.active_effect()
    }

    /// Current effect nesting depth.
    pub fn depth(&self) -> u32 {
        self.0.context.depth()
    }

    pub fn pause_tracking(&self) {
        self.0.context.pause_tracking();
    }

    pub fn enable_tracking(&self) {
        self.0.context.enable_tracking();
    }

    /// Restore the tracking flag saved by the last pause or enable.
    pub fn reset_tracking(&self) {
        self.0.context.reset_tracking();
    }

    /// Pause tracking until the returned guard is dropped.
    pub fn pause_guard(&self) -> TrackingPause<'_> {
        TrackingPause::new(&self.0.context)
    }

    /// Run `f` without tracking any of its reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.pause_guard();
        f()
    }

    // ------------------------------------------------------------------
    // Track
    // ------------------------------------------------------------------

    /// Record that the active effect depends on `(target, key)`.
    ///
    /// Does nothing outside an effect or while tracking is paused.
    pub fn track(&self, target: Target, op: TrackOp, key: &Key) {
        let Some(effect) = self.tracking_effect() else {
            return;
        };
        let dep = self.0.registry.get_or_create(target.id, key);
        self.track_effects(&dep, &effect, Some(target.id), op, key);
    }

    /// Record that the active effect depends on a directly owned set.
    pub fn track_dep(&self, dep: &Rc<Dep>) {
        if let Some(effect) = self.tracking_effect() {
            self.track_effects(dep, &effect, None, TrackOp::Get, &Key::name("value"));
        }
    }

    fn tracking_effect(&self) -> Option<ReactiveEffect> {
        if !self.0.context.should_track() {
            return None;
        }
        self.0.context.active_effect()
    }

    fn track_effects(
        &self,
        dep: &Rc<Dep>,
        effect: &ReactiveEffect,
        target: Option<ContainerId>,
        op: TrackOp,
        key: &Key,
    ) {
        if !effect.is_active() {
            return;
        }
        let context = &self.0.context;
        let should_add = if context.depth() <= self.0.config.max_marker_bits {
            let bit = context.track_op_bit();
            if dep.new_tracked(bit) {
                false
            } else {
                dep.mark_new_tracked(bit);
                !dep.was_tracked(bit)
            }
        } else {
            !dep.contains_id(effect.id())
        };

        if should_add {
            dep.insert(effect);
            effect.deps_mut().push(Rc::clone(dep));
            trace!(effect = effect.id().raw(), %key, ?op, "tracked");
            effect.notify_track(target, op, key);
        }
    }

    // ------------------------------------------------------------------
    // Trigger
    // ------------------------------------------------------------------

    /// Re-run every effect affected by a mutation of `target`.
    ///
    /// Does nothing if the container was never tracked. Each effect runs at
    /// most once per call, however many of the matched keys it reads.
    pub fn trigger(&self, target: Target, event: TriggerEvent) {
        let Some(deps) = self
            .0
            .registry
            .with_target(target.id, |key_deps| select_deps(target.kind, &event, key_deps))
        else {
            return;
        };
        self.trigger_effects(deps, Some(target.id), &event);
    }

    /// Re-run every effect subscribed to a directly owned set.
    pub fn trigger_dep(&self, dep: &Rc<Dep>) {
        let event = TriggerEvent::set(Key::name("value"));
        self.trigger_effects(vec![Rc::clone(dep)], None, &event);
    }

    fn trigger_effects(
        &self,
        deps: Vec<Rc<Dep>>,
        target: Option<ContainerId>,
        event: &TriggerEvent,
    ) {
        let mut effects: IndexMap<EffectId, ReactiveEffect> = IndexMap::new();
        for dep in &deps {
            for effect in dep.effects() {
                effects.entry(effect.id()).or_insert(effect);
            }
        }
        if effects.is_empty() {
            return;
        }
        trace!(
            target_id = target.map(|id| id.raw()),
            op = ?event.op,
            effects = effects.len(),
            "triggering"
        );
        for effect in effects.values() {
            self.trigger_effect(effect, target, event);
        }
    }

    fn trigger_effect(
        &self,
        effect: &ReactiveEffect,
        target: Option<ContainerId>,
        event: &TriggerEvent,
    ) {
        if !effect.is_active() {
            return;
        }
        if self.0.context.is_active(effect) && !effect.allows_recurse() {
            return;
        }
        effect.notify_trigger(target, event);
        match effect.scheduler().cloned() {
            Some(scheduler) => scheduler(effect),
            None => {
                effect.run();
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The dependency set for `(target, key)`, if one was ever created.
    pub fn dep(&self, target: ContainerId, key: &Key) -> Option<Rc<Dep>> {
        self.0.registry.get(target, key)
    }

    /// Number of containers with a registry entry.
    pub fn target_count(&self) -> usize {
        self.0.registry.len()
    }

    pub fn is_target_tracked(&self, target: ContainerId) -> bool {
        self.0.registry.contains(target)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.0.config)
            .field("depth", &self.depth())
            .field("targets", &self.target_count())
            .finish()
    }
}

/// Pick the dependency sets a mutation invalidates.
fn select_deps(
    kind: ContainerKind,
    event: &TriggerEvent,
    key_deps: &IndexMap<Key, Rc<Dep>>,
) -> Vec<Rc<Dep>> {
    if event.op == TriggerOp::Clear {
        return key_deps.values().cloned().collect();
    }

    if kind.is_sequence() && event.key == Some(Key::Length) {
        return key_deps
            .iter()
            .filter(|(key, _)| match key {
                Key::Length => true,
                Key::Index(index) => event.new_length.is_some_and(|len| *index >= len),
                _ => false,
            })
            .map(|(_, dep)| Rc::clone(dep))
            .collect();
    }

    let mut keys: Vec<Key> = Vec::with_capacity(3);
    if let Some(key) = &event.key {
        keys.push(key.clone());
    }
    match event.op {
        TriggerOp::Add if !kind.is_sequence() => {
            keys.push(Key::Iterate);
            if kind.is_map() {
                keys.push(Key::MapKeyIterate);
            }
        }
        TriggerOp::Add => {
            if event.key.as_ref().is_some_and(Key::is_index) {
                keys.push(Key::Length);
            }
        }
        TriggerOp::Delete if !kind.is_sequence() => {
            keys.push(Key::Iterate);
            if kind.is_map() {
                keys.push(Key::MapKeyIterate);
            }
        }
        TriggerOp::Set if kind.is_map() => {
            keys.push(Key::Iterate);
            keys.push(Key::MapKeyIterate);
        }
        _ => {}
    }
    keys.iter()
        .filter_map(|key| key_deps.get(key).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let runtime = Runtime::new();
        let target = runtime.observe(ContainerKind::Record);

        target.track(TrackOp::Get, &Key::name("a"));

        assert!(!runtime.is_target_tracked(target.id()));
    }

    #[test]
    fn trigger_untracked_target_is_noop() {
        let runtime = Runtime::new();
        let target = runtime.observe(ContainerKind::Record);
        target.trigger(TriggerEvent::set("a"));
        assert_eq!(runtime.target_count(), 0);
    }

    #[test]
    fn trigger_reruns_subscribed_effect() {
        let runtime = Runtime::new();
        let target = Rc::new(runtime.observe(ContainerKind::Record));
        let (count, seen) = counter();
        let t = target.clone();

        let _runner = runtime.effect(move || {
            t.track(TrackOp::Get, &Key::name("a"));
            count.set(count.get() + 1);
        });
        assert_eq!(seen.get(), 1);

        target.trigger(TriggerEvent::set("b"));
        assert_eq!(seen.get(), 1);

        target.trigger(TriggerEvent::set("a"));
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let runtime = Runtime::new();
        let target = Rc::new(runtime.observe(ContainerKind::Record));
        let (count, runs) = counter();
        let (sched, scheduled) = counter();
        let t = target.clone();

        let _runner = runtime.effect_with(
            move || {
                t.track(TrackOp::Get, &Key::name("a"));
                count.set(count.get() + 1);
            },
            EffectOptions::new().scheduler(move |_| sched.set(sched.get() + 1)),
        );

        target.trigger(TriggerEvent::set("a"));
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 1);
    }

    #[test]
    fn track_is_skipped_while_paused() {
        let runtime = Runtime::new();
        let target = Rc::new(runtime.observe(ContainerKind::Record));
        let t = target.clone();
        let rt = runtime.clone();

        let runner = runtime.effect(move || {
            rt.untracked(|| t.track(TrackOp::Get, &Key::name("a")));
        });

        assert_eq!(runner.effect().dep_count(), 0);
    }

    #[test]
    fn dropping_handle_purges_registry() {
        let runtime = Runtime::new();
        let target = Rc::new(runtime.observe(ContainerKind::Record));
        let t = target.clone();
        let runner = runtime.effect(move || t.track(TrackOp::Get, &Key::name("a")));
        let id = target.id();
        assert!(runtime.is_target_tracked(id));

        drop(runner);
        drop(target);
        assert!(!runtime.is_target_tracked(id));
    }

    #[test]
    fn runtimes_are_independent() {
        let first = Runtime::new();
        let second = Runtime::new();
        let target = Rc::new(first.observe(ContainerKind::Record));
        let t = target.clone();

        let _runner = second.effect(move || t.track(TrackOp::Get, &Key::name("a")));

        assert!(!first.is_target_tracked(target.id()));
        assert_eq!(second.target_count(), 0);
    }

    #[test]
    fn current_runtime_is_shared_per_thread() {
        assert!(Runtime::current().ptr_eq(&Runtime::current()));
    }

    fn deps_for(kind: ContainerKind, event: TriggerEvent, keys: &[Key]) -> Vec<Key> {
        let mut key_deps = IndexMap::new();
        let mut by_ptr = Vec::new();
        for key in keys {
            let dep = Dep::new();
            by_ptr.push((key.clone(), dep.clone()));
            key_deps.insert(key.clone(), dep);
        }
        select_deps(kind, &event, &key_deps)
            .iter()
            .map(|dep| {
                by_ptr
                    .iter()
                    .find(|(_, d)| Rc::ptr_eq(d, dep))
                    .map(|(k, _)| k.clone())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn select_clear_takes_everything() {
        let keys = [Key::name("a"), Key::Iterate, Key::MapKeyIterate];
        let picked = deps_for(ContainerKind::Map, TriggerEvent::clear(), &keys);
        assert_eq!(picked, keys.to_vec());
    }

    #[test]
    fn select_length_change_takes_truncated_indices() {
        let keys = [Key::Index(0), Key::Index(1), Key::Index(2), Key::Length, Key::Iterate];
        let picked = deps_for(ContainerKind::Sequence, TriggerEvent::length(1), &keys);
        assert_eq!(picked, vec![Key::Index(1), Key::Index(2), Key::Length]);
    }

    #[test]
    fn select_add_on_record_takes_iterate() {
        let keys = [Key::name("a"), Key::Iterate, Key::MapKeyIterate];
        let picked = deps_for(ContainerKind::Record, TriggerEvent::add("a"), &keys);
        assert_eq!(picked, vec![Key::name("a"), Key::Iterate]);
    }

    #[test]
    fn select_add_on_map_takes_both_sentinels() {
        let keys = [Key::name("a"), Key::Iterate, Key::MapKeyIterate];
        let picked = deps_for(ContainerKind::Map, TriggerEvent::add("a"), &keys);
        assert_eq!(picked, keys.to_vec());
    }

    #[test]
    fn select_add_index_on_sequence_takes_length() {
        let keys = [Key::Index(3), Key::Length, Key::Iterate];
        let picked = deps_for(ContainerKind::Sequence, TriggerEvent::add(Key::Index(3)), &keys);
        assert_eq!(picked, vec![Key::Index(3), Key::Length]);
    }

    #[test]
    fn select_delete_on_map_takes_both_sentinels() {
        let keys = [Key::name("a"), Key::Iterate, Key::MapKeyIterate];
        let picked = deps_for(ContainerKind::Map, TriggerEvent::delete("a"), &keys);
        assert_eq!(picked, keys.to_vec());
    }

    #[test]
    fn select_delete_on_sequence_takes_only_key() {
        let keys = [Key::Index(0), Key::Length, Key::Iterate];
        let picked = deps_for(ContainerKind::Sequence, TriggerEvent::delete(Key::Index(0)), &keys);
        assert_eq!(picked, vec![Key::Index(0)]);
    }

    #[test]
    fn select_set_on_record_takes_only_key() {
        let keys = [Key::name("a"), Key::Iterate];
        let picked = deps_for(ContainerKind::Record, TriggerEvent::set("a"), &keys);
        assert_eq!(picked, vec![Key::name("a")]);
    }

    #[test]
    fn select_set_on_map_takes_iteration_sentinels() {
        let keys = [Key::name("a"), Key::Iterate, Key::MapKeyIterate];
        let picked = deps_for(ContainerKind::Map, TriggerEvent::set("a"), &keys);
        assert_eq!(picked, keys.to_vec());
    }
}
