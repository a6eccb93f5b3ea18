//! Configuration module for dirsum
//!
//! Provides CLI arguments and the runtime settings of a digest run.

mod settings;

pub use settings::*;
