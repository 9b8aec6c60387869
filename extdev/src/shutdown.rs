//! Process shutdown sequencing.
//!
//! Components that own external resources implement [`Shutdown`] and are
//! registered on one [`ShutdownSequence`]. The top-level signal handler and
//! the panic hook both run that sequence, so components never exit the
//! process themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub trait Shutdown: Send + Sync {
    fn name(&self) -> &str;

    /// Best-effort synchronous cleanup. Must not panic.
    fn shutdown(&self);
}

#[derive(Default)]
pub struct ShutdownSequence {
    parts: Mutex<Vec<Arc<dyn Shutdown>>>,
    done: AtomicBool,
}

impl ShutdownSequence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, part: Arc<dyn Shutdown>) {
        if let Ok(mut parts) = self.parts.lock() {
            parts.push(part);
        }
    }

    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Shut every registered part down, most recently registered first. Only
    /// the first call does anything.
    pub fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let parts = match self.parts.lock() {
            Ok(parts) => parts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for part in parts.iter().rev() {
            tracing::debug!(component = part.name(), "shutting down");
            part.shutdown();
        }
    }
}

/// Which signal asked us to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopSignal::Interrupt => write!(f, "SIGINT"),
            StopSignal::Terminate => write!(f, "SIGTERM"),
            StopSignal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Wait for SIGINT, SIGTERM or SIGHUP.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<StopSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r.map(|_| StopSignal::Interrupt),
        _ = term.recv() => Ok(StopSignal::Terminate),
        _ = hup.recv() => Ok(StopSignal::Hangup),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<StopSignal> {
    tokio::signal::ctrl_c().await.map(|_| StopSignal::Interrupt)
}

/// Run `sequence` before the default panic handler reports the panic.
pub fn install_panic_hook(sequence: Arc<ShutdownSequence>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        sequence.run();
        previous(info);
    }));
}
