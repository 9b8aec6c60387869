//! Live-reload control channel between an instance and its companion extension.

mod changes;
mod filter;
mod notice;
mod reporter;
mod server;

pub use changes::{ManifestFields, classify_change, dispatch_cycle, find_manifest};
pub use filter::LogFilter;
pub use notice::{NoticeKey, NoticeState};
pub use reporter::{ReadySummary, Reporter, TerminalReporter};
pub use server::{
    ConnectionState, DEFAULT_HEARTBEAT_INTERVAL, ReloadConfig, ReloadError, ReloadHandle,
    ReloadServer,
};
