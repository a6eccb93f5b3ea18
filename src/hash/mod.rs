//! Hash computation module
//!
//! Streaming per-file hashing (SHA-256, BLAKE2b-256, BLAKE3) and the
//! deterministic fold of per-file results into one directory digest.

mod aggregate;
mod integrity;

pub use aggregate::*;
pub use integrity::*;
