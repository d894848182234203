//! CLI command implementations

pub mod completions;
pub mod config;
pub mod inspect;
pub mod replay;
