//! Logical deletion

mod marker;

pub use marker::{LogicDeletionMarker, UnsupportedOperationError};
