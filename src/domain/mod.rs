//! Business rules of the store, free of HTTP and SQL plumbing.

#[macro_use]
mod macros;

pub mod aggregates;
pub mod events;
pub mod value_objects;

use thiserror::Error;

/// A stored or submitted text value that names no known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
