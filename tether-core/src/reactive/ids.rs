//! Identifiers for effects, observed containers, and symbol keys.
//!
//! Identity matters more than value in this engine: two containers with
//! equal contents are still tracked separately. Every identifier is drawn
//! from its own process-wide counter.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique identifier.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw ID value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(
    /// Unique identifier for an effect.
    ///
    /// Dependency sets key their membership by this ID so that an effect
    /// can never be subscribed twice to the same set.
    EffectId
);

define_id!(
    /// Identity of an observed container.
    ///
    /// The registry is keyed by this ID instead of by the container itself,
    /// so registry entries never keep a container alive.
    ContainerId
);

define_id!(
    /// Identity of a user-defined symbol key.
    SymbolId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = EffectId::new();
        let b = EffectId::new();
        let c = EffectId::new();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn id_kinds_count_independently() {
        let first = ContainerId::new();
        let second = ContainerId::new();
        assert!(second.raw() > first.raw());
    }
}
