//! Instance Registry: the cross-process directory of development sessions.
//!
//! Every mutation is one locked read-modify-write of the Registry Store.
//! Reads never fail (a missing or corrupt store reads as empty); writes
//! propagate their errors.

mod alloc;
mod probe;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use extdev_core::{
    Browser, InstanceRecord, InstanceStats, InstanceStatus, InstanceUpdate, Registry,
};
use thiserror::Error;

pub use alloc::{BasePorts, DEFAULT_HTTP_BASE_PORT, DEFAULT_WEB_SOCKET_BASE_PORT, UsedPorts};
pub use probe::{LoopbackProbe, OsProcessProbe, PortProbe, ProcessProbe, is_port_available};
pub use store::{RegistryStore, StoreLock};

pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const RECORD_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

const INSTANCE_ID_LEN: usize = 12;
const INSTANCE_ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Chromium extension ids are 32 characters drawn from `a..=p`.
const MANAGER_ID_LEN: usize = 32;
const MANAGER_ID_ALPHABET: [char; 16] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to write instance registry {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to lock instance registry {0}: {1}")]
    Lock(PathBuf, std::io::Error),

    #[error("Failed to serialize instance registry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No free port at or above {base}")]
    PortsExhausted { base: u16 },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// What one cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub marked_terminated: Vec<String>,
}

/// Drop terminal and aged-out records, and mark running records whose
/// process is gone as terminated so a later pass removes them.
pub fn sweep(registry: &mut Registry, now_ms: u64, processes: &dyn ProcessProbe) -> SweepReport {
    let retention = RECORD_RETENTION.as_millis() as u64;
    let mut report = SweepReport::default();

    registry.instances.retain(|id, record| {
        let keep = !record.status.is_terminal() && record.age_ms(now_ms) <= retention;
        if !keep {
            report.removed.push(id.clone());
        }
        keep
    });

    for record in registry.instances.values_mut() {
        if record.is_running() && !processes.is_alive(record.process_id) {
            record.status = InstanceStatus::Terminated;
            report.marked_terminated.push(record.instance_id.clone());
        }
    }

    registry.last_cleanup = now_ms;
    report
}

pub struct InstanceRegistry {
    store: RegistryStore,
    profiles_root: PathBuf,
    bases: BasePorts,
    ports: Arc<dyn PortProbe>,
    processes: Arc<dyn ProcessProbe>,
}

impl InstanceRegistry {
    /// Registry rooted at the application home directory.
    pub fn open(home: &Path) -> Self {
        Self::new(RegistryStore::in_home(home), crate::paths::profiles_dir(home))
    }

    pub fn new(store: RegistryStore, profiles_root: PathBuf) -> Self {
        Self {
            store,
            profiles_root,
            bases: BasePorts::default(),
            ports: Arc::new(LoopbackProbe),
            processes: Arc::new(OsProcessProbe),
        }
    }

    pub fn with_base_ports(mut self, bases: BasePorts) -> Self {
        self.bases = bases;
        self
    }

    pub fn with_port_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.ports = probe;
        self
    }

    pub fn with_process_probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.processes = probe;
        self
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn create_instance(
        &self,
        browser: Browser,
        project_path: &Path,
        requested_port: Option<u16>,
    ) -> Result<InstanceRecord> {
        let _lock = self.store.lock()?;
        let mut registry = self.store.load();
        let now = now_ms();

        if now.saturating_sub(registry.last_cleanup) > CLEANUP_INTERVAL.as_millis() as u64 {
            let report = sweep(&mut registry, now, self.processes.as_ref());
            if !report.removed.is_empty() || !report.marked_terminated.is_empty() {
                tracing::debug!(
                    removed = report.removed.len(),
                    terminated = report.marked_terminated.len(),
                    "swept instance registry"
                );
            }
        }

        let used = UsedPorts::from_registry(&registry);
        let (port, web_socket_port) =
            alloc::allocate(&used, requested_port, self.bases, self.ports.as_ref())?;

        let instance_id = loop {
            let id = nanoid::nanoid!(INSTANCE_ID_LEN, &INSTANCE_ID_ALPHABET);
            if !registry.instances.contains_key(&id) {
                break id;
            }
        };

        let record = InstanceRecord {
            profile_path: self
                .profiles_root
                .join(format!("{}-{}", browser.as_str(), instance_id)),
            instance_id,
            process_id: std::process::id(),
            port,
            web_socket_port,
            browser,
            manager_extension_id: nanoid::nanoid!(MANAGER_ID_LEN, &MANAGER_ID_ALPHABET),
            extension_id: None,
            project_path: project_path.to_path_buf(),
            start_time: now,
            status: InstanceStatus::Running,
        };

        registry.insert(record.clone());
        self.store.save(&registry)?;

        tracing::info!(
            instance = %record.instance_id,
            port = record.port,
            web_socket_port = record.web_socket_port,
            browser = %record.browser,
            "created instance"
        );
        Ok(record)
    }

    /// Merge `update` into the stored record. Absent ids are a no-op.
    pub fn update_instance(&self, id: &str, update: InstanceUpdate) -> Result<()> {
        self.store.update(|registry| {
            if let Some(record) = registry.instances.get_mut(id) {
                record.apply(update);
            }
        })
    }

    /// Mark the record terminated. The record stays until the next sweep.
    pub fn terminate_instance(&self, id: &str) -> Result<()> {
        self.update_instance(id, InstanceUpdate::status(InstanceStatus::Terminated))
    }

    pub fn get_instance(&self, id: &str) -> Option<InstanceRecord> {
        self.store.load().instances.remove(id)
    }

    pub fn get_instance_by_port(&self, port: u16) -> Option<InstanceRecord> {
        self.store
            .load()
            .instances
            .into_values()
            .find(|r| r.is_running() && r.port == port)
    }

    pub fn get_instance_by_web_socket_port(&self, port: u16) -> Option<InstanceRecord> {
        self.store
            .load()
            .instances
            .into_values()
            .find(|r| r.is_running() && r.web_socket_port == port)
    }

    pub fn get_running_instances(&self) -> Vec<InstanceRecord> {
        self.store
            .load()
            .instances
            .into_values()
            .filter(InstanceRecord::is_running)
            .collect()
    }

    pub fn all_instances(&self) -> Vec<InstanceRecord> {
        self.store.load().instances.into_values().collect()
    }

    /// Whether the record is running and its process still exists.
    ///
    /// A running record whose process is gone is flipped to terminated.
    pub fn is_instance_running(&self, id: &str) -> bool {
        let Some(record) = self.get_instance(id) else {
            return false;
        };
        if !record.is_running() {
            return false;
        }
        if self.processes.is_alive(record.process_id) {
            return true;
        }

        tracing::debug!(instance = %id, pid = record.process_id, "instance process is gone");
        if let Err(e) = self.terminate_instance(id) {
            tracing::warn!(instance = %id, error = %e, "failed to mark dead instance terminated");
        }
        false
    }

    pub fn get_stats(&self) -> InstanceStats {
        self.store.load().stats()
    }

    /// Run a cleanup pass now, regardless of when the last one ran.
    pub fn cleanup_orphans(&self) -> Result<SweepReport> {
        let now = now_ms();
        self.store
            .update(|registry| sweep(registry, now, self.processes.as_ref()))
    }
}
