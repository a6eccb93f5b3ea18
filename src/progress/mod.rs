//! Progress reporting module
//!
//! Renders hashing progress from the shared completion counter.

mod reporter;

pub use reporter::*;
