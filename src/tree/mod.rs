//! Directory tree module
//!
//! Mirrors the scanned filesystem hierarchy in memory, keeps per-directory
//! file weights, and flattens the hierarchy into the hashing work list.

mod builder;
mod node;

pub use builder::*;
pub use node::*;
