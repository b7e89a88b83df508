//! Tidemark Error - Unified Error Types
//!
//! Error handling shared by the series engine, the collection agent and the
//! embedding application. Errors are categorised by the pipeline stage that
//! produced them so the agent can decide whether to skip a tick, skip a
//! compaction, or reject a registration outright.
//!
//! Key Features:
//! - Stage-specific variants (collection, reduction, configuration)
//! - Transient error detection for per-tick skip decisions
//! - Read API errors for unknown series and type mismatches
//! - Seamless integration with std::io::Error for config loading
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use chrono::{DateTime, Utc};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all Tidemark operations.
#[derive(Error, Debug)]
pub enum TidemarkError {
    // Pipeline errors
    #[error("collection failed: {0}")]
    Collection(String),

    #[error("reduction failed: {0}")]
    Reduction(String),

    #[error("out of order sample for series '{name}': {generated_at} is older than newest {newest}")]
    OutOfOrder {
        name: String,
        generated_at: DateTime<Utc>,
        newest: DateTime<Utc>,
    },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("parse error: {0}")]
    Parse(String),

    // Read API errors
    #[error("series not found: {0}")]
    SeriesNotFound(String),

    #[error("series '{name}' does not hold values of type {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for Tidemark operations.
pub type Result<T> = std::result::Result<T, TidemarkError>;

// =============================================================================
// Error Classification
// =============================================================================

impl TidemarkError {
    /// Returns true if the failure only affects the current tick of one series.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TidemarkError::Collection(_)
                | TidemarkError::Reduction(_)
                | TidemarkError::OutOfOrder { .. }
        )
    }

    /// Returns true if the error was caused by invalid settings.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TidemarkError::Configuration(_) | TidemarkError::Parse(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
