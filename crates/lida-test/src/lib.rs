//! exomol2lida Test Harness - Synthetic datasets and engine validation
//!
//! This crate provides:
//! - Seeded synthetic ExoMol-like datasets
//! - In-memory engine runs with arbitrary batch sizes
//! - Brute-force invariant checks of engine output
//! - Property tests for batch-size invariance
//! - End-to-end pipeline tests over generated dataset files

pub mod synthetic;
pub mod harness;
pub mod invariants;

#[cfg(test)]
mod properties;
#[cfg(test)]
mod pipeline;

pub use synthetic::*;
pub use harness::*;
pub use invariants::*;
