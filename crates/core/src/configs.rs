//! Configuration parsing for Stepfiles and runner settings

pub mod settings;
pub mod stepfile;
