//! exomol2lida I/O - ExoMol inputs in, LIDA tables out
//!
//! This crate provides:
//! - Molecule input files and their validation
//! - Dataset file discovery
//! - Chunked `.states` / `.trans` readers (the record stream adapter)
//! - Output writers for composite states and transitions
//! - Electronic label post-processing

pub mod input;
pub mod dataset;
pub mod reader;
pub mod writer;
pub mod electronic;

pub use input::*;
pub use dataset::*;
pub use reader::*;
pub use writer::*;
pub use electronic::*;
