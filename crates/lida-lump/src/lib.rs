//! exomol2lida Lumping Engine - Streaming reduction of states and transitions
//!
//! This crate implements the bounded-memory lumping pipeline:
//! - Validated lumping configuration
//! - State filtering
//! - State lumping with the lowest-J reference energy
//! - Original-to-composite state index
//! - Transition pre-lumping and combination
//! - Lifetime synthesis with top-channel renormalization
//!
//! State lumping must finish before transition lumping starts: the
//! [`TransitionLumper`] borrows the [`StateIndex`] produced by
//! [`StateLumper::finish`].

pub mod config;
pub mod filter;
pub mod aggregate;
pub mod states;
pub mod index;
pub mod transitions;
pub mod lifetimes;

pub use config::*;
pub use filter::*;
pub use aggregate::*;
pub use states::*;
pub use index::*;
pub use transitions::*;
pub use lifetimes::*;
