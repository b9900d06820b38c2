//! Observed Containers
//!
//! Explicit wrapper types standing in for transparent property interception.
//! Every accessor reports its read to [`Runtime::track`](crate::reactive::Runtime::track)
//! and every mutation to [`Runtime::trigger`](crate::reactive::Runtime::trigger),
//! so effects that read through these wrappers re-run when the data they read
//! changes.
//!
//! - [`ReactiveRecord`]: string-keyed container, record-like or map-like.
//! - [`ReactiveList`]: index-addressed sequence with a length.
//! - [`ReactiveCell`]: a single value.

mod cell;
mod list;
mod record;

pub use cell::ReactiveCell;
pub use list::ReactiveList;
pub use record::ReactiveRecord;
