//! lightrun - workspace script and binary runner
//!
//! Resolves a command name inside a multi-package workspace to a declared
//! script, a binary exposed by a dependency, or a raw shell command, then runs
//! it with every binary the workspace can see on the search path.

pub mod cache;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod process;
pub mod project;
pub mod resolve;
pub mod shim;
pub mod ui;

pub use error::{LightrunError, LightrunResult};
