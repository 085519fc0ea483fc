//! Process-facing side of the `glot` client.
//!
//! This crate owns runtime integration details (the HTTP bridge transport,
//! the one-shot artifact receiver, the `git` scaffold cloner, configuration
//! and logging) and wires them into the protocol types of `glot_core`.

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
