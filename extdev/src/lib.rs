//! extdev - concurrent browser extension development sessions.
//!
//! Each `extdev dev` process registers an instance in a shared registry,
//! receives conflict-free ports, generates a companion extension bound to
//! them, and runs a live-reload WebSocket channel to that extension.

pub mod addon;
pub mod cli;
pub mod commands;
pub mod config;
pub mod extension;
pub mod output;
pub mod paths;
pub mod port_manager;
pub mod registry;
pub mod reload;
pub mod shutdown;
