//! Persisted instance records
//!
//! These types are the on-disk shape of `instances.json`. Field names are
//! camelCase so the store stays readable by other tooling that shares it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::Browser;

/// Lifecycle status of an instance. `Terminated` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Terminated,
    Error,
}

impl InstanceStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Running => write!(f, "running"),
            InstanceStatus::Terminated => write!(f, "terminated"),
            InstanceStatus::Error => write!(f, "error"),
        }
    }
}

/// One running development session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: String,
    pub process_id: u32,
    pub port: u16,
    pub web_socket_port: u16,
    pub browser: Browser,
    pub manager_extension_id: String,
    /// Browser-assigned id of the user's extension, learned during the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
    pub profile_path: PathBuf,
    pub project_path: PathBuf,
    /// Creation time in milliseconds since the unix epoch.
    pub start_time: u64,
    pub status: InstanceStatus,
}

impl InstanceRecord {
    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_time)
    }

    /// Merge the set fields of `update` into this record.
    pub fn apply(&mut self, update: InstanceUpdate) {
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(port) = update.web_socket_port {
            self.web_socket_port = port;
        }
        if let Some(id) = update.extension_id {
            self.extension_id = Some(id);
        }
        if let Some(path) = update.profile_path {
            self.profile_path = path;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }
}

/// Partial update merged into a stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceUpdate {
    pub port: Option<u16>,
    pub web_socket_port: Option<u16>,
    pub extension_id: Option<String>,
    pub profile_path: Option<PathBuf>,
    pub status: Option<InstanceStatus>,
}

impl InstanceUpdate {
    pub fn extension_id(id: impl Into<String>) -> Self {
        Self {
            extension_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn status(status: InstanceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// The whole registry file.
///
/// Keys always equal the `instance_id` of the record they map to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceRecord>,
    /// Last cleanup sweep in milliseconds since the unix epoch.
    #[serde(default)]
    pub last_cleanup: u64,
}

impl Registry {
    pub fn insert(&mut self, record: InstanceRecord) {
        self.instances.insert(record.instance_id.clone(), record);
    }

    pub fn running(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.instances.values().filter(|r| r.is_running())
    }

    pub fn stats(&self) -> InstanceStats {
        let mut stats = InstanceStats::default();
        for record in self.instances.values() {
            stats.total += 1;
            match record.status {
                InstanceStatus::Running => stats.running += 1,
                InstanceStatus::Terminated => stats.terminated += 1,
                InstanceStatus::Error => stats.error += 1,
            }
        }
        stats
    }
}

/// Instance counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStats {
    pub total: usize,
    pub running: usize,
    pub terminated: usize,
    pub error: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: InstanceStatus) -> InstanceRecord {
        InstanceRecord {
            instance_id: id.to_string(),
            process_id: 42,
            port: 8080,
            web_socket_port: 9000,
            browser: Browser::Chrome,
            manager_extension_id: "abcdefghijklmnopabcdefghijklmnop".to_string(),
            extension_id: None,
            profile_path: PathBuf::from("/tmp/profile"),
            project_path: PathBuf::from("/tmp/project"),
            start_time: 1_000,
            status,
        }
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_string(&record("a1", InstanceStatus::Running)).unwrap();
        assert!(json.contains(r#""instanceId":"a1""#));
        assert!(json.contains(r#""webSocketPort":9000"#));
        assert!(json.contains(r#""managerExtensionId""#));
        assert!(json.contains(r#""status":"running""#));
        assert!(!json.contains("extensionId\":null"));
    }

    #[test]
    fn test_registry_defaults_for_empty_object() {
        let registry: Registry = serde_json::from_str("{}").unwrap();
        assert!(registry.instances.is_empty());
        assert_eq!(registry.last_cleanup, 0);
    }

    #[test]
    fn test_apply_merges_only_set_fields() {
        let mut rec = record("a1", InstanceStatus::Running);
        rec.apply(InstanceUpdate::extension_id("ext-123"));
        assert_eq!(rec.extension_id.as_deref(), Some("ext-123"));
        assert_eq!(rec.port, 8080);
        assert_eq!(rec.status, InstanceStatus::Running);

        rec.apply(InstanceUpdate::status(InstanceStatus::Terminated));
        assert_eq!(rec.status, InstanceStatus::Terminated);
        assert_eq!(rec.extension_id.as_deref(), Some("ext-123"));
    }

    #[test]
    fn test_stats_count_by_status() {
        let mut registry = Registry::default();
        registry.insert(record("a", InstanceStatus::Running));
        registry.insert(record("b", InstanceStatus::Running));
        registry.insert(record("c", InstanceStatus::Terminated));
        registry.insert(record("d", InstanceStatus::Error));

        let stats = registry.stats();
        assert_eq!(
            stats,
            InstanceStats {
                total: 4,
                running: 2,
                terminated: 1,
                error: 1,
            }
        );
        assert_eq!(registry.running().count(), 2);
    }

    #[test]
    fn test_status_display_and_terminal() {
        assert_eq!(InstanceStatus::Terminated.to_string(), "terminated");
        assert!(InstanceStatus::Error.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
    }
}
