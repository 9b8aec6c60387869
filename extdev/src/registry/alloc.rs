//! Conflict-free port selection.

use std::collections::HashSet;

use extdev_core::Registry;

use super::probe::PortProbe;
use super::{RegistryError, Result};

pub const DEFAULT_HTTP_BASE_PORT: u16 = 8080;
pub const DEFAULT_WEB_SOCKET_BASE_PORT: u16 = 9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasePorts {
    pub http: u16,
    pub web_socket: u16,
}

impl Default for BasePorts {
    fn default() -> Self {
        Self {
            http: DEFAULT_HTTP_BASE_PORT,
            web_socket: DEFAULT_WEB_SOCKET_BASE_PORT,
        }
    }
}

/// Ports recorded by every stored instance, whatever its status.
#[derive(Debug, Default)]
pub struct UsedPorts {
    pub http: HashSet<u16>,
    pub web_socket: HashSet<u16>,
}

impl UsedPorts {
    pub fn from_registry(registry: &Registry) -> Self {
        let mut used = Self::default();
        for record in registry.instances.values() {
            used.http.insert(record.port);
            used.web_socket.insert(record.web_socket_port);
        }
        used
    }
}

/// Pick an HTTP and a WebSocket port.
///
/// A requested HTTP port is honored only when it is both free on loopback
/// and unrecorded; otherwise both ports come from a linear scan upward from
/// their bases. The WebSocket scan also skips the HTTP port just chosen.
pub fn allocate(
    used: &UsedPorts,
    requested: Option<u16>,
    bases: BasePorts,
    probe: &dyn PortProbe,
) -> Result<(u16, u16)> {
    let requested = requested.filter(|&port| {
        let ok = port != 0 && !used.http.contains(&port) && probe.is_available(port);
        if !ok {
            tracing::debug!(port, "requested port unavailable; allocating automatically");
        }
        ok
    });

    let port = match requested {
        Some(port) => port,
        None => scan(bases.http, probe, |p| !used.http.contains(&p))?,
    };
    let web_socket_port = scan(bases.web_socket, probe, |p| {
        p != port && !used.web_socket.contains(&p)
    })?;

    Ok((port, web_socket_port))
}

fn scan(base: u16, probe: &dyn PortProbe, unrecorded: impl Fn(u16) -> bool) -> Result<u16> {
    (base.max(1)..=u16::MAX)
        .find(|&p| unrecorded(p) && probe.is_available(p))
        .ok_or(RegistryError::PortsExhausted { base })
}
