//! Stepfile Core Library
//!
//! Core library for the `step` command runner. It parses Stepfiles, expands
//! dependency groups, schedules commands in dependency order and executes
//! them with configurable failure propagation.
//!
//! ## Architecture
//!
//! - [`stepfile_manager`] - High-level interface used by the CLI
//! - [`configs`] - Stepfile parser and `stepfile.yml` runner settings
//! - [`groups`] - Group dependency expansion
//! - [`schedule`] - Dependency graph, validation and topological order
//! - [`execution`] - Command launch plus the sequential and parallel runners
//! - [`events`] - Run events and reporters
//! - [`inspector`] - Read-only dependency report
//! - [`variables`] - `$NAME$` substitution
//! - [`results`] - Outcome records produced by runs
//! - [`colors`] - Terminal colors for command labels
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stepfile_core::events::NoopReporter;
//! use stepfile_core::{StepfileManager, StepfileManagerConfig};
//! use std::path::PathBuf;
//!
//! # fn example() -> stepfile_core::StepfileResult<()> {
//! let manager = StepfileManager::new(StepfileManagerConfig {
//!     stepfile_path: PathBuf::from("Stepfile"),
//! })?;
//!
//! println!("{}", manager.visualize());
//! let report = manager.run(true, &NoopReporter)?;
//! # Ok(())
//! # }
//! ```

pub mod colors;
pub mod configs;
pub mod events;
pub mod execution;
pub mod groups;
pub mod inspector;
pub mod results;
pub mod schedule;
pub mod stepfile_manager;
pub mod types;
pub mod variables;

pub use stepfile_manager::{StepfileManager, StepfileManagerConfig};
pub use types::{ErrorCategory, StepfileError, StepfileResult};
