//! Reload channel protocol
//!
//! JSON text frames exchanged over the per-instance WebSocket between the
//! reload server and the companion extension running in the browser.

use serde::{Deserialize, Serialize};

use crate::LogEvent;

/// WebSocket close code used when a peer presents another instance's id.
pub const POLICY_VIOLATION_CLOSE_CODE: u16 = 1008;

/// Reload category sent to the browser when a project file changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangedFile {
    #[serde(rename = "manifest.json")]
    Manifest,
    #[serde(rename = "_locales")]
    Locales,
    #[serde(rename = "service_worker")]
    ServiceWorker,
    #[serde(rename = "declarative_net_request")]
    DeclarativeNetRequest,
    #[serde(rename = "entrypoint")]
    Entrypoint,
}

impl ChangedFile {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangedFile::Manifest => "manifest.json",
            ChangedFile::Locales => "_locales",
            ChangedFile::ServiceWorker => "service_worker",
            ChangedFile::DeclarativeNetRequest => "declarative_net_request",
            ChangedFile::Entrypoint => "entrypoint",
        }
    }
}

impl std::fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent from the reload server to the companion extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Status(ServerStatus),
    Change {
        #[serde(rename = "changedFile")]
        changed_file: ChangedFile,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ServerStatus {
    ServerReady {
        #[serde(rename = "instanceId")]
        instance_id: String,
    },
}

impl ServerMessage {
    pub fn server_ready(instance_id: impl Into<String>) -> Self {
        Self::Status(ServerStatus::ServerReady {
            instance_id: instance_id.into(),
        })
    }

    pub fn change(changed_file: ChangedFile) -> Self {
        Self::Change { changed_file }
    }
}

/// Raw shape shared by every message the companion extension sends.
///
/// The identity check runs on the envelope before the payload is
/// interpreted, so messages with unknown statuses are still checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnvelope {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Identity of the user's extension as reported by `chrome.management`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientReady {
    /// Browser-assigned id of the user's extension.
    pub id: String,
    pub management: ManagementInfo,
}

/// Interpreted client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    ClientReady(ClientReady),
    Log(LogEvent),
    Other(String),
}

impl ClientEnvelope {
    pub fn client_ready(instance_id: impl Into<String>, ready: &ClientReady) -> Self {
        Self {
            status: "clientReady".to_string(),
            instance_id: Some(instance_id.into()),
            data: serde_json::to_value(ready).ok(),
        }
    }

    /// Interpret the payload according to `status`.
    pub fn into_message(self) -> Result<ClientMessage, serde_json::Error> {
        let data = self.data.unwrap_or(serde_json::Value::Null);
        match self.status.as_str() {
            "clientReady" => Ok(ClientMessage::ClientReady(serde_json::from_value(data)?)),
            "log" => Ok(ClientMessage::Log(serde_json::from_value(data)?)),
            _ => Ok(ClientMessage::Other(self.status)),
        }
    }
}
