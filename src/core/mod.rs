//! Shared infrastructure: error types and harness configuration.

pub mod config;
pub mod errors;
