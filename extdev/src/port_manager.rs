//! Per-process facade binding one "current" instance to a dev run.

use std::path::Path;
use std::sync::{Arc, Mutex};

use extdev_core::{Browser, InstanceRecord, InstanceStats, InstanceUpdate};

use crate::registry::{self, InstanceRegistry};
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAllocation {
    pub port: u16,
    pub web_socket_port: u16,
    pub instance: InstanceRecord,
}

pub struct PortManager {
    registry: Arc<InstanceRegistry>,
    current: Mutex<Option<InstanceRecord>>,
}

impl PortManager {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self {
            registry,
            current: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Create a fresh instance and make it current, terminating any previous one.
    pub fn allocate_ports(
        &self,
        browser: Browser,
        project_path: &Path,
        requested_port: Option<u16>,
    ) -> registry::Result<PortAllocation> {
        self.terminate_current_instance();

        let instance = self
            .registry
            .create_instance(browser, project_path, requested_port)?;
        self.set_current(Some(instance.clone()));

        Ok(PortAllocation {
            port: instance.port,
            web_socket_port: instance.web_socket_port,
            instance,
        })
    }

    pub fn current_instance(&self) -> Option<InstanceRecord> {
        self.current.lock().ok().and_then(|c| c.clone())
    }

    pub fn update_extension_id(&self, extension_id: &str) -> registry::Result<()> {
        let Some(instance) = self.current_instance() else {
            return Ok(());
        };
        self.registry
            .update_instance(&instance.instance_id, InstanceUpdate::extension_id(extension_id))?;
        if let Ok(mut current) = self.current.lock()
            && let Some(record) = current.as_mut()
        {
            record.extension_id = Some(extension_id.to_string());
        }
        Ok(())
    }

    /// Terminate the current instance, if any. Failures are logged.
    pub fn terminate_current_instance(&self) {
        let previous = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some(instance) = previous
            && let Err(e) = self.registry.terminate_instance(&instance.instance_id)
        {
            tracing::warn!(instance = %instance.instance_id, error = %e, "failed to terminate instance");
        }
    }

    pub fn get_stats(&self) -> InstanceStats {
        self.registry.get_stats()
    }

    pub fn is_port_available(&self, port: u16) -> bool {
        registry::is_port_available(port)
    }

    fn set_current(&self, instance: Option<InstanceRecord>) {
        if let Ok(mut current) = self.current.lock() {
            *current = instance;
        }
    }
}

impl Shutdown for PortManager {
    fn name(&self) -> &str {
        "port-manager"
    }

    fn shutdown(&self) {
        self.terminate_current_instance();
    }
}
