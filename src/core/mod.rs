//! Core digest engine module
//!
//! Provides the run orchestration and the bounded worker pool that hashes
//! the enumerated files.

mod engine;
mod hasher;

pub use engine::*;
pub use hasher::*;
