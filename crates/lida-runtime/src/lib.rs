//! exomol2lida Runtime - Dataset processing pipeline
//!
//! This crate ties the engine to the filesystem:
//! 1. Validate the molecule input and locate its dataset
//! 2. Lump states
//! 3. Write the state tables
//! 4. Lump transitions and synthesize lifetimes
//! 5. Write the lifetimes and transitions
//! 6. Optionally post-process the electronic labels

pub mod config;
pub mod processor;
pub mod logging;

pub use config::*;
pub use processor::*;
pub use logging::*;
