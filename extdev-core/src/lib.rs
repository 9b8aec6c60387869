//! extdev Core - Shared protocol types
//!
//! This crate contains the data types shared between the instance registry,
//! the reload server and the CLI: browser targets, persisted instance
//! records, and the JSON messages exchanged with the companion extension.
//!
//! All I/O (registry file, sockets, generated extensions) lives in the
//! `extdev` and `extdev-socket` crates.

mod browser;
mod instance;
mod log;
mod protocol;

pub use browser::*;
pub use instance::*;
pub use log::*;
pub use protocol::*;
