//! # storyreg
//!
//! Command line front end for `storyreg-core`: configuration, CLI commands
//! and log setup.

pub mod cli;
pub mod config;
