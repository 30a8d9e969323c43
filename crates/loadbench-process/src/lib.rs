//! # Loadbench Process
//!
//! Low-level process operations for the benchmark harness.
//!
//! This crate provides the primitives the runner composes into a managed
//! server lifecycle:
//! - Spawning a server from an argument list plus environment
//! - Process existence verification
//! - Graceful termination and forced kill

pub mod check;
pub mod execute;
pub mod terminate;

// Re-export main types
pub use check::*;
pub use execute::*;
pub use terminate::*;
