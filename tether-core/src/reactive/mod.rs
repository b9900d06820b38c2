//! Reactive Engine
//!
//! This module implements dependency tracking between observed data and
//! effects.
//!
//! # Concepts
//!
//! ## Dependency Sets
//!
//! Every `(container, key)` pair that an effect has read gets a [`Dep`]: the
//! set of effects subscribed to it. Sets are created on first read and live
//! as long as the container stays registered.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a re-runnable computation. It keeps the list of
//! sets it belongs to; membership is always updated on both sides together,
//! so an effect is in a set exactly when the set is in the effect's list.
//!
//! ## Track and Trigger
//!
//! The interception layer calls [`Runtime::track`] on reads and
//! [`Runtime::trigger`] on writes. Reads outside any effect are ignored;
//! writes to containers nobody read are ignored.
//!
//! # Implementation Notes
//!
//! After each run an effect is subscribed to exactly the keys it read during
//! that run. Instead of clearing and rebuilding its subscriptions every time,
//! each set carries two bitmasks indexed by nesting depth that flag "was
//! subscribed before this run" and "read during this run"; only the stale
//! difference is removed at the end. Past the configured depth the engine
//! falls back to the clear-and-rebuild approach.

mod context;
mod dep;
mod effect;
mod ids;
mod key;
mod registry;
mod runtime;

pub use context::TrackingPause;
pub use dep::Dep;
pub use effect::{
    DebuggerEvent, DebuggerEventKind, DebuggerHook, EffectFn, EffectOptions, EffectRunner,
    EffectScope, ReactiveEffect, RunOutcome, Scheduler,
};
pub use ids::{ContainerId, EffectId, SymbolId};
pub use key::{is_integer_key, ContainerKind, Key, TrackOp, TriggerEvent, TriggerOp};
pub use runtime::{Runtime, Target, TargetHandle};
