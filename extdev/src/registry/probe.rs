//! Port Prober and process liveness checks.

use std::net::TcpListener;

/// Answers whether a TCP port can currently be bound.
pub trait PortProbe: Send + Sync {
    fn is_available(&self, port: u16) -> bool;
}

/// Binds `127.0.0.1:{port}` and immediately releases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackProbe;

impl PortProbe for LoopbackProbe {
    fn is_available(&self, port: u16) -> bool {
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                drop(listener);
                true
            }
            Err(_) => false,
        }
    }
}

pub fn is_port_available(port: u16) -> bool {
    LoopbackProbe.is_available(port)
}

/// Answers whether an OS process still exists.
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessProbe;

impl ProcessProbe for OsProcessProbe {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        // pid 0 would address our own process group.
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        if unsafe { libc::kill(pid, 0) } == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to someone else.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    fn is_alive(&self, pid: u32) -> bool {
        pid != 0
    }
}
