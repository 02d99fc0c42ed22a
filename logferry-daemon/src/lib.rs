//! logferry daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `logferry-daemon` is used as a binary (main.rs).

pub mod bootstrap;
pub mod cli;
pub mod health;
pub mod logging;
pub mod orchestrator;
