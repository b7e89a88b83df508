//! Tidemark Common - Shared Types and Utilities
//!
//! Error handling and configuration shared by every Tidemark component.
//! Provides the core abstractions that let the series engine, the agent and
//! the embedding application agree on failure semantics and interval
//! settings.
//!
//! Key Features:
//! - Unified error type with transient error detection
//! - Agent interval configuration with TOML loading
//! - Registration-time validation of downsampling settings
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod config;
pub mod error;

pub use config::{expected_bucket_size, AgentConfig, MIN_BUCKET_SIZE};
pub use error::{Result, TidemarkError};
