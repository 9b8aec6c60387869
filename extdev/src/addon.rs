//! Temporary add-on installation over the remote debugging protocol.

use std::path::{Path, PathBuf};

use extdev_socket::{RdpClient, RdpError, RetryPolicy};
use serde_json::{Value, json};

/// An add-on the browser accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledAddon {
    pub id: String,
    pub path: PathBuf,
}

/// Install each path as a temporary add-on. Dev tools are opened for the
/// first add-on only, and only when `open_devtools` is set.
pub async fn install_temporary_addons(
    client: &RdpClient,
    paths: &[PathBuf],
    open_devtools: bool,
) -> Result<Vec<InstalledAddon>, RdpError> {
    let mut installed = Vec::with_capacity(paths.len());
    for (idx, path) in paths.iter().enumerate() {
        let root = client.request("root", "getRoot", Value::Null).await?;
        let addons_actor = root["addonsActor"]
            .as_str()
            .ok_or_else(|| RdpError::Protocol("getRoot reply has no addonsActor".to_string()))?;

        let reply = client
            .request(
                addons_actor,
                "installTemporaryAddon",
                json!({
                    "addonPath": addon_path(path),
                    "openDevTools": open_devtools && idx == 0,
                }),
            )
            .await?;

        let id = reply["addon"]["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                RdpError::Protocol("installTemporaryAddon reply has no addon id".to_string())
            })?
            .to_string();
        tracing::info!(addon = %id, path = %path.display(), "installed temporary add-on");
        installed.push(InstalledAddon {
            id,
            path: path.clone(),
        });
    }
    Ok(installed)
}

/// Connect to the browser's debugging port and install `paths`.
pub async fn connect_and_install(
    port: u16,
    retry: RetryPolicy,
    paths: &[PathBuf],
    open_devtools: bool,
) -> Result<Vec<InstalledAddon>, RdpError> {
    let client = RdpClient::connect(port, retry).await?;
    let result = install_temporary_addons(&client, paths, open_devtools).await;
    client.close();
    result
}

fn addon_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
