//! Tether Core
//!
//! This crate provides a fine-grained reactive dependency tracking engine.
//! It records which effects read which pieces of observed state and re-runs
//! exactly the affected effects when that state changes.
//!
//! - Dependency sets, the container/key registry, and the tracking context
//! - Effects with nested runs, self-recursion guards, and deferred stop
//! - Observed containers that route reads and writes through track/trigger
//!
//! # Architecture
//!
//! - `reactive`: the engine (track, trigger, effects)
//! - `observe`: observed record, list, and cell wrappers
//! - `config`: runtime configuration
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tether_core::observe::ReactiveRecord;
//! use tether_core::Runtime;
//!
//! let runtime = Runtime::new();
//! let state = Rc::new(ReactiveRecord::new_in(&runtime).with_entries([("count", 0)]));
//! let seen = Rc::new(Cell::new(-1));
//!
//! let (s, out) = (state.clone(), seen.clone());
//! let _runner = runtime.effect(move || out.set(s.get("count").unwrap_or_default()));
//! assert_eq!(seen.get(), 0);
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 5);
//! ```

pub mod config;
pub mod error;
pub mod observe;
pub mod reactive;
pub mod utils;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{
    EffectOptions, EffectRunner, Key, ReactiveEffect, RunOutcome, Runtime, Target, TrackOp,
    TriggerEvent,
};

/// Create an effect on the current thread's runtime and run it once.
pub fn effect(f: impl Fn() + 'static) -> EffectRunner {
    Runtime::current().effect(f)
}

/// Create an effect with options on the current thread's runtime.
pub fn effect_with(f: impl Fn() + 'static, options: EffectOptions) -> EffectRunner {
    Runtime::current().effect_with(f, options)
}

/// Stop the effect behind `runner`.
pub fn stop(runner: &EffectRunner) {
    runner.stop();
}

/// Record a read of `(target, key)` on the current thread's runtime.
pub fn track(target: Target, op: TrackOp, key: &Key) {
    Runtime::current().track(target, op, key);
}

/// Report a mutation of `target` to the current thread's runtime.
pub fn trigger(target: Target, event: TriggerEvent) {
    Runtime::current().trigger(target, event);
}
