//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All output goes through this module so quiet and JSON modes are handled
//! in one place. Diagnostics go to stderr through `tracing`.

pub mod output;
