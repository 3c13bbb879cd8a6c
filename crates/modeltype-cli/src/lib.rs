//! # modeltype-cli
//!
//! Management commands and the `modeltype` binary.
//!
//! - **Command framework** - [`ManagementCommand`] and [`CommandRegistry`]
//! - **Built-in commands** - `transpile`, `check`, and `lookups`, each reading
//!   models from a JSON schema file
//!
//! ## Quick Start
//!
//! ```rust
//! use modeltype_cli::command::CommandRegistry;
//! use modeltype_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"transpile"));
//! assert!(names.contains(&"check"));
//! ```

// - result_large_err: ModelTypeError is the crate-wide error type
// - unused_async: command handlers keep a uniform async signature
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;

pub use command::{CommandRegistry, ManagementCommand};
