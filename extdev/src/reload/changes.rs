//! File-change classification.
//!
//! Maps a changed path to the reload category the companion extension acts
//! on, using the fields of the project's `manifest.json`.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use extdev_core::ChangedFile;
use serde_json::Value;

/// Paths the manifest refers to, resolved against the manifest's directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFields {
    pub manifest: PathBuf,
    pub service_workers: Vec<PathBuf>,
    pub rulesets: Vec<PathBuf>,
    pub pages: Vec<PathBuf>,
}

impl ManifestFields {
    pub fn from_manifest(manifest_path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(manifest_path)?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_value(manifest_path, &value))
    }

    pub fn from_value(manifest_path: &Path, manifest: &Value) -> Self {
        let root = manifest_path.parent().unwrap_or(Path::new(""));
        let resolve = |rel: &str| root.join(rel.trim_start_matches("./"));

        let mut fields = Self {
            manifest: manifest_path.to_path_buf(),
            ..Self::default()
        };

        let background = &manifest["background"];
        if let Some(sw) = background["service_worker"].as_str() {
            fields.service_workers.push(resolve(sw));
        }
        for script in strings(&background["scripts"]) {
            fields.service_workers.push(resolve(script));
        }
        if let Some(page) = background["page"].as_str() {
            fields.pages.push(resolve(page));
        }

        if let Some(resources) = manifest["declarative_net_request"]["rule_resources"].as_array() {
            for res in resources {
                if let Some(path) = res["path"].as_str() {
                    fields.rulesets.push(resolve(path));
                }
            }
        }

        let page_fields = [
            &manifest["action"]["default_popup"],
            &manifest["browser_action"]["default_popup"],
            &manifest["page_action"]["default_popup"],
            &manifest["options_page"],
            &manifest["options_ui"]["page"],
            &manifest["devtools_page"],
            &manifest["side_panel"]["default_path"],
            &manifest["sidebar_action"]["default_panel"],
            &manifest["chrome_url_overrides"]["newtab"],
            &manifest["chrome_url_overrides"]["history"],
            &manifest["chrome_url_overrides"]["bookmarks"],
        ];
        for field in page_fields {
            if let Some(page) = field.as_str() {
                fields.pages.push(resolve(page));
            }
        }
        for page in strings(&manifest["sandbox"]["pages"]) {
            fields.pages.push(resolve(page));
        }

        fields
    }
}

fn strings(value: &Value) -> impl Iterator<Item = &str> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Classify one changed path. The first matching category wins, in the
/// order manifest, locales, service worker, ruleset, entrypoint.
pub fn classify_change(path: &Path, fields: &ManifestFields) -> Option<ChangedFile> {
    if path == fields.manifest {
        return Some(ChangedFile::Manifest);
    }
    if path
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == "_locales"))
    {
        return Some(ChangedFile::Locales);
    }
    if fields.service_workers.iter().any(|p| p == path) {
        return Some(ChangedFile::ServiceWorker);
    }
    if fields.rulesets.iter().any(|p| p == path) {
        return Some(ChangedFile::DeclarativeNetRequest);
    }
    if fields.pages.iter().any(|p| p == path)
        || path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
    {
        return Some(ChangedFile::Entrypoint);
    }
    None
}

/// Classify one watch cycle's worth of changed paths. Duplicate paths yield
/// one message; unclassified paths yield none.
pub fn dispatch_cycle<'a>(
    paths: impl IntoIterator<Item = &'a Path>,
    fields: &ManifestFields,
) -> Vec<(PathBuf, ChangedFile)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in paths {
        if !seen.insert(path.to_path_buf()) {
            continue;
        }
        if let Some(changed) = classify_change(path, fields) {
            out.push((path.to_path_buf(), changed));
        }
    }
    out
}

/// Locate the project's manifest: `manifest.json` or `src/manifest.json`.
pub fn find_manifest(project: &Path) -> Option<PathBuf> {
    ["manifest.json", "src/manifest.json"]
        .iter()
        .map(|rel| project.join(rel))
        .find(|p| p.is_file())
}
