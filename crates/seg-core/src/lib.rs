//! Core types and utilities for segmentation dataset preparation.
//!
//! This crate provides the error type, configuration structures and shared
//! helpers used by the dataset jobs and the `segprep` tool.

pub mod cli;
pub mod config;
pub mod error;
pub mod types;

pub use cli::*;
pub use config::*;
pub use error::{Error, Result};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::cli::*;
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
    pub use crate::types::*;
}
