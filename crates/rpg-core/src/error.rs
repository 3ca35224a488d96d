//! Error taxonomy for the encode/evolve pipeline.
//!
//! Most errors here are non-fatal and are accumulated into an operation's `errors` list rather
//! than aborting. Only [`RpgError::Storage`] and [`RpgError::Validation`] are fatal; callers
//! should treat every other variant as a recorded-and-continue event.

use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy shared by the parser, encoder, and evolver.
///
/// Variants map 1:1 onto the kinds described in the error handling design: everything except
/// [`Storage`](RpgError::Storage) and [`Validation`](RpgError::Validation) is recoverable at the
/// file or entity scope.
#[derive(Debug, Error)]
pub enum RpgError {
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("symbol resolution miss for `{symbol}` in {file}")]
    SymbolResolutionMiss { file: PathBuf, symbol: String },

    #[error("semantic extraction failed for `{entity}` after {attempts} attempt(s)")]
    SemanticExtraction { entity: String, attempts: u32 },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("git error: {0}")]
    Git(String),

    #[error("router failure for `{entity}`: {reason}")]
    Router { entity: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),
}

impl RpgError {
    /// Fatal errors abort the whole operation; everything else is recorded and execution
    /// continues (see `ERROR HANDLING DESIGN` in SPEC_FULL.md).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, RpgError::Storage(_) | RpgError::Validation(_))
    }
}
