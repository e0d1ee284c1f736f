//! exomol2lida Core - Fundamental types and primitives
//!
//! This crate defines the types shared by the lumping engine and its collaborators:
//! - Identifiers (OriginalId, LumpedId)
//! - State and transition records as produced by the record stream adapter
//! - The composite grouping key (LumpKey)
//! - Physical constants and unit conversions
//! - Error types

pub mod id;
pub mod record;
pub mod units;
pub mod error;

pub use id::*;
pub use record::*;
pub use units::*;
pub use error::*;
