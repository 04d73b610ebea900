//! Command execution module
//!
//! This module handles the actual execution of scheduled commands including
//! command preparation, dependency gating and result reporting.

pub mod command;
pub mod parallel;
pub mod runner;

pub use command::{OutputMode, PreparedCommand};
pub use parallel::ParallelRunner;
pub use runner::{RunOptions, SequentialRunner};
