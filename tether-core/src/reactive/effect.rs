//! Effect Implementation
//!
//! An effect is a re-runnable computation. Every run records which observed
//! keys the body read; a later write to any of them re-runs the effect (or
//! hands it to its scheduler).
//!
//! # How Effects Work
//!
//! 1. `run()` installs the effect as the active effect one level deeper and
//!    marks every dependency set it is already subscribed to as "was tracked"
//!    for this depth.
//!
//! 2. The body runs. Each tracked read either renews an existing
//!    subscription (sets the "newly tracked" bit) or creates a new one.
//!
//! 3. On exit, whichever way the body ended, subscriptions that were not
//!    renewed are dropped, and the previous active effect is restored.
//!
//! Past the configured marker depth the bit trick is not available, so the
//! effect drops all of its subscriptions before running and re-subscribes
//! from scratch.
//!
//! # Lifecycle
//!
//! An effect is active until stopped. Stopping unsubscribes it everywhere
//! and is idempotent. A stop requested by the effect's own body is deferred
//! until that run finishes. Dropping the last handle to an effect also
//! unsubscribes it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::{SavedFrame, TrackingPause};
use super::dep::{finalize_dep_markers, init_dep_markers, DepList};
use super::ids::{ContainerId, EffectId};
use super::key::{Key, TrackOp, TriggerEvent};
use super::runtime::Runtime;

pub(crate) type WeakEffect = Weak<EffectInner>;

/// A shareable effect body.
///
/// Cloning an `EffectFn` shares the same closure, which is how a runner can
/// be re-wrapped into a new effect without nesting bodies.
#[derive(Clone)]
pub struct EffectFn(Rc<dyn Fn()>);

impl EffectFn {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Whether two bodies are the same closure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self) {
        (self.0)()
    }
}

impl fmt::Debug for EffectFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EffectFn(..)")
    }
}

/// Called instead of `run()` when a triggered effect has a scheduler.
pub type Scheduler = Rc<dyn Fn(&ReactiveEffect)>;

/// Debug hook receiving track and trigger events.
pub type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

/// What a debug hook is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebuggerEventKind {
    Track { op: TrackOp, key: Key },
    Trigger(TriggerEvent),
}

/// Event passed to `on_track` / `on_trigger` in debug builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    /// The container involved, or `None` for a directly owned [`Dep`](super::Dep).
    pub target: Option<ContainerId>,
    pub kind: DebuggerEventKind,
}

/// External grouping object that effects can register into.
///
/// The engine only records membership; stopping the group is up to the
/// implementor.
pub trait EffectScope {
    fn is_active(&self) -> bool;
    fn record(&self, effect: &ReactiveEffect);
}

/// Options accepted by [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub lazy: bool,
    pub allow_recurse: bool,
    pub scheduler: Option<Scheduler>,
    pub scope: Option<Rc<dyn EffectScope>>,
    pub on_stop: Option<Rc<dyn Fn()>>,
    pub on_track: Option<DebuggerHook>,
    pub on_trigger: Option<DebuggerHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Let a trigger raised during this effect's own run dispatch it again.
    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&ReactiveEffect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn scope(mut self, scope: Rc<dyn EffectScope>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn on_stop(mut self, on_stop: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(on_stop));
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("allow_recurse", &self.allow_recurse)
            .field("scheduler", &self.scheduler.is_some())
            .field("scope", &self.scope.is_some())
            .finish_non_exhaustive()
    }
}

/// What a call to [`ReactiveEffect::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The body ran and its reads were tracked.
    Tracked,
    /// The effect is stopped; the body ran with tracking paused.
    Untracked,
    /// The effect is already running further up the stack; nothing ran.
    Skipped,
}

pub(crate) struct EffectInner {
    id: EffectId,
    runtime: Runtime,
    body: EffectFn,
    scheduler: Option<Scheduler>,
    on_stop: Option<Rc<dyn Fn()>>,
    on_track: Option<DebuggerHook>,
    on_trigger: Option<DebuggerHook>,
    allow_recurse: Cell<bool>,
    active: Cell<bool>,
    defer_stop: Cell<bool>,
    deps: RefCell<DepList>,
    /// The effect that was active when this one started running.
    parent: RefCell<Option<ReactiveEffect>>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        for dep in self.deps.get_mut().drain(..) {
            dep.remove(self.id);
        }
    }
}

/// Handle to an effect. Clones share the same effect.
#[derive(Clone)]
pub struct ReactiveEffect(Rc<EffectInner>);

impl ReactiveEffect {
    pub(crate) fn new(runtime: Runtime, body: EffectFn, options: &EffectOptions) -> Self {
        Self(Rc::new(EffectInner {
            id: EffectId::new(),
            runtime,
            body,
            scheduler: options.scheduler.clone(),
            on_stop: options.on_stop.clone(),
            on_track: options.on_track.clone(),
            on_trigger: options.on_trigger.clone(),
            allow_recurse: Cell::new(options.allow_recurse),
            active: Cell::new(true),
            defer_stop: Cell::new(false),
            deps: RefCell::new(SmallVec::new()),
            parent: RefCell::new(None),
        }))
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &WeakEffect) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    pub fn id(&self) -> EffectId {
        self.0.id
    }

    /// Whether the effect can still run and be subscribed.
    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Number of dependency sets the effect is subscribed to.
    pub fn dep_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    pub fn allows_recurse(&self) -> bool {
        self.0.allow_recurse.get()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.0.allow_recurse.set(allow);
    }

    pub fn body(&self) -> EffectFn {
        self.0.body.clone()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn scheduler(&self) -> Option<&Scheduler> {
        self.0.scheduler.as_ref()
    }

    pub(crate) fn deps_mut(&self) -> std::cell::RefMut<'_, DepList> {
        self.0.deps.borrow_mut()
    }

    fn parent(&self) -> Option<ReactiveEffect> {
        self.0.parent.borrow().clone()
    }

    /// Run the body, tracking what it reads.
    ///
    /// A stopped effect runs its body with tracking paused. If this effect
    /// is already somewhere on the active stack the call returns
    /// [`RunOutcome::Skipped`] without running anything.
    ///
    /// A panic in the body propagates to the caller after the context has
    /// been restored and stale subscriptions pruned.
    pub fn run(&self) -> RunOutcome {
        let context = self.0.runtime.context();

        if !self.is_active() {
            let _pause = TrackingPause::new(context);
            self.0.body.call();
            return RunOutcome::Untracked;
        }

        if self.is_running() {
            debug!(effect = self.id().raw(), "effect already running, skipping nested run");
            return RunOutcome::Skipped;
        }

        let frame = context.enter(self);
        *self.0.parent.borrow_mut() = frame.parent.clone();

        let depth = context.depth();
        if depth <= self.0.runtime.config().max_marker_bits {
            init_dep_markers(&self.0.deps.borrow(), context.track_op_bit());
        } else {
            debug!(
                effect = self.id().raw(),
                depth, "marker depth exceeded, rebuilding subscriptions from scratch"
            );
            self.cleanup();
        }

        let _guard = RunGuard {
            effect: self,
            frame: Some(frame),
        };
        trace!(effect = self.id().raw(), depth, "running effect");
        self.0.body.call();
        RunOutcome::Tracked
    }

    /// Whether this effect is the active effect or one of its ancestors.
    fn is_running(&self) -> bool {
        let mut ancestor = self.0.runtime.context().active_effect();
        while let Some(effect) = ancestor {
            if effect.ptr_eq(self) {
                return true;
            }
            ancestor = effect.parent();
        }
        false
    }

    /// Stop the effect.
    ///
    /// While the effect is running, including when a nested effect stops
    /// it, the stop is applied when its run ends. Its sets still carry this
    /// run's depth markers until then. Stopping a stopped effect does nothing.
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        if self.is_running() {
            debug!(effect = self.id().raw(), "deferring stop until run completes");
            self.0.defer_stop.set(true);
            return;
        }
        self.cleanup();
        self.0.active.set(false);
        if let Some(on_stop) = &self.0.on_stop {
            on_stop();
        }
        debug!(effect = self.id().raw(), "effect stopped");
    }

    /// Remove the effect from every set it is subscribed to.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id());
        }
    }

    pub(crate) fn notify_track(&self, target: Option<ContainerId>, op: TrackOp, key: &Key) {
        if cfg!(debug_assertions) {
            if let Some(hook) = &self.0.on_track {
                hook(&DebuggerEvent {
                    effect: self.id(),
                    target,
                    kind: DebuggerEventKind::Track {
                        op,
                        key: key.clone(),
                    },
                });
            }
        }
    }

    pub(crate) fn notify_trigger(&self, target: Option<ContainerId>, event: &TriggerEvent) {
        if cfg!(debug_assertions) {
            if let Some(hook) = &self.0.on_trigger {
                hook(&DebuggerEvent {
                    effect: self.id(),
                    target,
                    kind: DebuggerEventKind::Trigger(event.clone()),
                });
            }
        }
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

/// Finishes an effect run on every exit path, including unwinding.
struct RunGuard<'a> {
    effect: &'a ReactiveEffect,
    frame: Option<SavedFrame>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.effect.0;
        let context = inner.runtime.context();

        if context.depth() <= inner.runtime.config().max_marker_bits {
            finalize_dep_markers(
                inner.id,
                &mut inner.deps.borrow_mut(),
                context.track_op_bit(),
            );
        }
        if let Some(frame) = self.frame.take() {
            context.exit(frame);
        }
        inner.parent.borrow_mut().take();

        if inner.defer_stop.replace(false) {
            self.effect.stop();
        }
    }
}

/// The value returned by the `effect` factory.
///
/// Dropping every runner and every other handle to the effect unsubscribes
/// it, so keep the runner for as long as the effect should stay live.
#[derive(Debug, Clone)]
#[must_use = "dropping the runner unsubscribes the effect"]
pub struct EffectRunner {
    effect: ReactiveEffect,
}

impl EffectRunner {
    pub(crate) fn new(effect: ReactiveEffect) -> Self {
        Self { effect }
    }

    pub fn run(&self) -> RunOutcome {
        self.effect.run()
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    /// The underlying effect.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }

    /// The body this runner was built from.
    pub fn body(&self) -> EffectFn {
        self.effect.body()
    }

    /// Build a new effect around this runner's original body.
    pub fn rewrap(&self, options: EffectOptions) -> EffectRunner {
        self.effect.runtime().effect_fn(self.body(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();

        let _runner = runtime.effect(move || counter.set(counter.get() + 1));

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();

        let runner = runtime.effect_with(
            move || counter.set(counter.get() + 1),
            EffectOptions::new().lazy(),
        );
        assert_eq!(run_count.get(), 0);

        assert_eq!(runner.run(), RunOutcome::Tracked);
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn body_without_reads_has_no_deps() {
        let runtime = Runtime::new();
        let runner = runtime.effect(|| {});
        assert_eq!(runner.effect().dep_count(), 0);
    }

    #[test]
    fn stop_is_idempotent_and_calls_on_stop_once() {
        let runtime = Runtime::new();
        let stops = Rc::new(Cell::new(0));
        let counter = stops.clone();

        let runner = runtime.effect_with(
            || {},
            EffectOptions::new().on_stop(move || counter.set(counter.get() + 1)),
        );
        runner.stop();
        runner.stop();

        assert!(!runner.effect().is_active());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn on_stop_can_stop_again_without_reentering() {
        let runtime = Runtime::new();
        let slot: Rc<std::cell::RefCell<Option<EffectRunner>>> = Rc::default();
        let stops = Rc::new(Cell::new(0));
        let active_in_hook = Rc::new(Cell::new(true));

        let (sl, counter, seen) = (slot.clone(), stops.clone(), active_in_hook.clone());
        let runner = runtime.effect_with(
            || {},
            EffectOptions::new().on_stop(move || {
                counter.set(counter.get() + 1);
                let me = sl.borrow().clone();
                if let Some(me) = me {
                    seen.set(me.effect().is_active());
                    me.stop();
                }
            }),
        );
        *slot.borrow_mut() = Some(runner.clone());

        runner.stop();

        assert_eq!(stops.get(), 1);
        assert!(!active_in_hook.get());
        slot.borrow_mut().take();
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let runtime = Runtime::new();
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();
        let tracked = Rc::new(Cell::new(true));
        let observed = tracked.clone();
        let rt = runtime.clone();

        let runner = runtime.effect(move || {
            counter.set(counter.get() + 1);
            observed.set(rt.is_tracking());
        });
        runner.stop();

        assert_eq!(runner.run(), RunOutcome::Untracked);
        assert_eq!(run_count.get(), 2);
        assert!(!tracked.get());
    }

    #[test]
    fn rewrap_shares_body() {
        let runtime = Runtime::new();
        let run_count = Rc::new(Cell::new(0));
        let counter = run_count.clone();

        let first = runtime.effect(move || counter.set(counter.get() + 1));
        let second = first.rewrap(EffectOptions::new());

        assert!(first.body().ptr_eq(&second.body()));
        assert!(!first.effect().ptr_eq(second.effect()));
        assert_eq!(run_count.get(), 2);
    }

    #[test]
    fn scope_records_effect() {
        struct Group {
            members: RefCell<Vec<ReactiveEffect>>,
        }
        impl EffectScope for Group {
            fn is_active(&self) -> bool {
                true
            }
            fn record(&self, effect: &ReactiveEffect) {
                self.members.borrow_mut().push(effect.clone());
            }
        }

        let runtime = Runtime::new();
        let group = Rc::new(Group {
            members: RefCell::new(Vec::new()),
        });
        let runner = runtime.effect_with(|| {}, EffectOptions::new().scope(group.clone()));

        let members = group.members.borrow();
        assert_eq!(members.len(), 1);
        assert!(members[0].ptr_eq(runner.effect()));
    }

    #[test]
    fn inactive_scope_does_not_record() {
        struct Closed(Cell<usize>);
        impl EffectScope for Closed {
            fn is_active(&self) -> bool {
                false
            }
            fn record(&self, _effect: &ReactiveEffect) {
                self.0.set(self.0.get() + 1);
            }
        }

        let runtime = Runtime::new();
        let scope = Rc::new(Closed(Cell::new(0)));
        let _runner = runtime.effect_with(|| {}, EffectOptions::new().scope(scope.clone()));
        assert_eq!(scope.0.get(), 0);
    }
}
