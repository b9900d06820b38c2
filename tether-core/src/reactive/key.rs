//! Keys and operation kinds.
//!
//! The interception layer describes every access with a [`Key`] and either a
//! [`TrackOp`] (reads) or a [`TriggerEvent`] (writes). Container categories
//! are a closed set resolved once when a container is registered.

use std::fmt;
use std::rc::Rc;

use super::ids::SymbolId;

/// A key addressing part of an observed container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named property.
    Name(Rc<str>),
    /// An integer index into a sequence.
    Index(usize),
    /// A user-defined symbol.
    Symbol(SymbolId),
    /// The length of a sequence.
    Length,
    /// Sentinel: "any key", depended on by full enumeration.
    Iterate,
    /// Sentinel: "any map key", depended on by key-only enumeration of maps.
    MapKeyIterate,
}

impl Key {
    /// Build a named key.
    pub fn name(name: impl Into<Rc<str>>) -> Self {
        Key::Name(name.into())
    }

    /// Classify a textual key.
    ///
    /// Canonical non-negative integers (`"0"`, `"17"`, but not `"01"` or
    /// `"-1"`) become [`Key::Index`]; `"length"` becomes [`Key::Length`];
    /// anything else is a [`Key::Name`].
    pub fn classify(raw: &str) -> Self {
        if is_integer_key(raw) {
            if let Ok(index) = raw.parse() {
                return Key::Index(index);
            }
        }
        if raw == "length" {
            return Key::Length;
        }
        Key::name(raw)
    }

    /// Whether this key addresses a sequence slot.
    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }

    /// Whether this key is one of the enumeration sentinels.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Key::Iterate | Key::MapKeyIterate)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::classify(raw)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Symbol(id) => write!(f, "Symbol({})", id.raw()),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::MapKeyIterate => f.write_str("<map-key-iterate>"),
        }
    }
}

/// Whether `raw` spells a canonical non-negative integer.
pub fn is_integer_key(raw: &str) -> bool {
    match raw.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        bytes => bytes.iter().all(u8::is_ascii_digit),
    }
}

/// Category of an observed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Plain record with named properties.
    Record,
    /// Ordered sequence addressed by index, with a length.
    Sequence,
    /// Map-like container whose key set can be enumerated separately.
    Map,
}

impl ContainerKind {
    pub fn is_sequence(self) -> bool {
        self == ContainerKind::Sequence
    }

    pub fn is_map(self) -> bool {
        self == ContainerKind::Map
    }
}

/// Kind of read reported to `track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write reported to `trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// Description of a mutation passed to `trigger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub op: TriggerOp,
    pub key: Option<Key>,
    /// New length, present only for length changes of a sequence.
    pub new_length: Option<usize>,
}

impl TriggerEvent {
    /// An existing key was given a different value.
    pub fn set(key: impl Into<Key>) -> Self {
        Self {
            op: TriggerOp::Set,
            key: Some(key.into()),
            new_length: None,
        }
    }

    /// A key that did not exist was written.
    pub fn add(key: impl Into<Key>) -> Self {
        Self {
            op: TriggerOp::Add,
            key: Some(key.into()),
            new_length: None,
        }
    }

    /// A key was removed.
    pub fn delete(key: impl Into<Key>) -> Self {
        Self {
            op: TriggerOp::Delete,
            key: Some(key.into()),
            new_length: None,
        }
    }

    /// The whole container was cleared.
    pub fn clear() -> Self {
        Self {
            op: TriggerOp::Clear,
            key: None,
            new_length: None,
        }
    }

    /// A sequence's length was set to `new_length`.
    pub fn length(new_length: usize) -> Self {
        Self {
            op: TriggerOp::Set,
            key: Some(Key::Length),
            new_length: Some(new_length),
        }
    }
}
