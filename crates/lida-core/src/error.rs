//! Error types for exomol2lida

use std::path::PathBuf;

use thiserror::Error;

use crate::{LumpedId, OriginalId};

/// Core exomol2lida errors
#[derive(Error, Debug)]
pub enum LidaError {
    // Configuration errors
    #[error("Missing mandatory input attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("No resolved quanta configured (one of resolve_el, resolve_vib required)")]
    MissingResolvedQuanta,

    #[error("Field {0:?} listed as both electronic and vibrational resolved quantum")]
    OverlappingResolvedQuanta(String),

    #[error("Field {0:?} cannot be resolved or filtered on")]
    ReservedField(String),

    #[error("Field {0:?} not present in the states header")]
    UnknownField(String),

    #[error("Unexpected states header: {0}")]
    UnexpectedStatesHeader(String),

    #[error("Isomers must be resolved or filtered with only_with, cannot lump over {0:?}")]
    UnresolvedIsomers(String),

    #[error("Input not found: {0}")]
    MissingInput(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Input errors
    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} composite states exceed the composite id range")]
    TooManyCompositeStates(usize),

    // Output errors
    #[error("Output directory {0:?} is not empty")]
    OutputExists(PathBuf),

    #[error("Post-processing failed: {0}")]
    PostProcess(String),

    // Internal consistency errors
    #[error("Composite transition references unknown composite state {0}")]
    MissingLumpedState(LumpedId),

    #[error("Original state {0} missing from the state index")]
    UnindexedState(OriginalId),

    #[error("Stage order violated: {0}")]
    StageOrder(&'static str),
}

impl LidaError {
    /// Configuration errors are detected before any streaming begins
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            LidaError::MissingAttribute(_)
                | LidaError::MissingResolvedQuanta
                | LidaError::OverlappingResolvedQuanta(_)
                | LidaError::ReservedField(_)
                | LidaError::UnknownField(_)
                | LidaError::UnexpectedStatesHeader(_)
                | LidaError::UnresolvedIsomers(_)
                | LidaError::MissingInput(_)
                | LidaError::InvalidConfig(_)
        )
    }

    /// Internal consistency failures indicate a bug, never bad input
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            LidaError::MissingLumpedState(_)
                | LidaError::UnindexedState(_)
                | LidaError::StageOrder(_)
        )
    }
}

/// Result type for exomol2lida operations
pub type LidaResult<T> = Result<T, LidaError>;
