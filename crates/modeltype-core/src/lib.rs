//! # modeltype-core
//!
//! Core types, settings, and error types for modeltype.
//! This crate has no dependency on the other modeltype crates and provides the
//! foundation for all of them.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Generation and request settings
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ModelTypeError, ModelTypeResult, ValidationError};
pub use settings::{LogFormat, Settings};
