//! Pulse Core
//!
//! Logging and profiling shared by the Pulse crates.

pub mod logging;
pub mod profiling;
