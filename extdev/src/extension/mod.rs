//! Companion Extension Generator.
//!
//! Materializes a per-instance browser extension from a browser-specific
//! template: the manifest gets an identity for this instance, the
//! reload-service script gets the instance's WebSocket port and id, and
//! every other template file is copied verbatim. Templates ship inside the
//! binary; a directory can replace them.

mod bundled;
pub mod template;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use extdev_core::{Browser, EngineFamily, InstanceRecord};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::registry::InstanceRegistry;
use template::{RELOAD_SCRIPT, TemplateValues};

const MANIFEST: &str = "manifest.json";
const KEY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension template not found at {0}")]
    TemplateMissing(PathBuf),

    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest at {0} is not a JSON object")]
    InvalidManifest(PathBuf),

    #[error("Failed to generate extension key: {0}")]
    Random(String),
}

pub type Result<T> = std::result::Result<T, ExtensionError>;

/// Where companion templates are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateSource {
    /// Templates compiled into the binary.
    #[default]
    Bundled,
    /// A directory with one subdirectory per engine family
    /// (`chromium/`, `gecko/`).
    Dir(PathBuf),
}

impl TemplateSource {
    pub fn from_override(dir: Option<PathBuf>) -> Self {
        dir.map_or(TemplateSource::Bundled, TemplateSource::Dir)
    }

    fn load(&self, browser: Browser) -> Result<BrowserTemplate> {
        match self {
            TemplateSource::Bundled => {
                let tpl = bundled::for_family(browser.family());
                Ok(BrowserTemplate {
                    origin: PathBuf::from("<bundled>").join(browser.template_dir()),
                    manifest: tpl.manifest.to_string(),
                    script: tpl.script.to_string(),
                    assets: Assets::Bundled(tpl.assets),
                })
            }
            TemplateSource::Dir(root) => {
                let dir = root.join(browser.template_dir());
                let manifest_path = dir.join(MANIFEST);
                let script_path = dir.join(RELOAD_SCRIPT);
                if !manifest_path.is_file() || !script_path.is_file() {
                    return Err(ExtensionError::TemplateMissing(dir));
                }
                let manifest = fs::read_to_string(&manifest_path)
                    .map_err(|e| ExtensionError::Read(manifest_path.clone(), e))?;
                let script = fs::read_to_string(&script_path)
                    .map_err(|e| ExtensionError::Read(script_path.clone(), e))?;
                Ok(BrowserTemplate {
                    origin: dir.clone(),
                    manifest,
                    script,
                    assets: Assets::Dir(dir),
                })
            }
        }
    }
}

struct BrowserTemplate {
    origin: PathBuf,
    manifest: String,
    script: String,
    assets: Assets,
}

enum Assets {
    Bundled(&'static [(&'static str, &'static str)]),
    Dir(PathBuf),
}

impl Assets {
    fn write_to(&self, dest: &Path) -> Result<()> {
        match self {
            Assets::Bundled(files) => {
                for (rel, content) in files.iter() {
                    let path = dest.join(rel);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)
                            .map_err(|e| ExtensionError::Write(parent.to_path_buf(), e))?;
                    }
                    fs::write(&path, content).map_err(|e| ExtensionError::Write(path.clone(), e))?;
                }
                Ok(())
            }
            Assets::Dir(dir) => copy_assets(dir, dest),
        }
    }
}

/// A generated companion extension on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionExtension {
    pub extension_id: String,
    pub manifest: Value,
    pub service_worker_path: PathBuf,
    pub extension_path: PathBuf,
}

/// What [`ExtensionGenerator::regenerate_extension_if_needed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Generated,
    Reused,
    Regenerated,
}

pub struct ExtensionGenerator {
    templates: TemplateSource,
    output_root: PathBuf,
    registry: Arc<InstanceRegistry>,
}

impl ExtensionGenerator {
    pub fn new(
        templates: TemplateSource,
        output_root: impl Into<PathBuf>,
        registry: Arc<InstanceRegistry>,
    ) -> Self {
        Self {
            templates,
            output_root: output_root.into(),
            registry,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory an instance's companion is generated into.
    pub fn extension_path(&self, instance: &InstanceRecord) -> PathBuf {
        self.output_root.join(format!(
            "{}-manager-{}",
            instance.browser.as_str(),
            instance.port
        ))
    }

    pub fn generate_extension(&self, instance: &InstanceRecord) -> Result<CompanionExtension> {
        let template = self.templates.load(instance.browser)?;

        let dest = self.extension_path(instance);
        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(|e| ExtensionError::Write(dest.clone(), e))?;
        }
        fs::create_dir_all(&dest).map_err(|e| ExtensionError::Write(dest.clone(), e))?;

        template.assets.write_to(&dest)?;

        let mut manifest = parse_manifest(&template.manifest, &template.origin.join(MANIFEST))?;
        embed_identity(&mut manifest, instance)?;
        let manifest_path = dest.join(MANIFEST);
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&manifest_path, manifest_json)
            .map_err(|e| ExtensionError::Write(manifest_path.clone(), e))?;

        let rendered = template::render(
            &template.script,
            &TemplateValues {
                reload_port: instance.web_socket_port,
                instance_id: instance.instance_id.clone(),
            },
        );
        let service_worker_path = dest.join(RELOAD_SCRIPT);
        fs::write(&service_worker_path, rendered)
            .map_err(|e| ExtensionError::Write(service_worker_path.clone(), e))?;

        tracing::debug!(
            instance = %instance.instance_id,
            path = %dest.display(),
            web_socket_port = instance.web_socket_port,
            "generated companion extension"
        );

        Ok(CompanionExtension {
            extension_id: instance.manager_extension_id.clone(),
            manifest,
            service_worker_path,
            extension_path: dest,
        })
    }

    /// Return the existing companion if it was generated for this instance
    /// and its current WebSocket port; otherwise (re)generate it.
    ///
    /// Ports are recycled once old records are swept, so a leftover
    /// directory at the same path may belong to an earlier instance.
    pub fn regenerate_extension_if_needed(
        &self,
        instance: &InstanceRecord,
    ) -> Result<(CompanionExtension, Generation)> {
        let dest = self.extension_path(instance);
        let script_path = dest.join(RELOAD_SCRIPT);
        let manifest_path = dest.join(MANIFEST);

        let existing = fs::read_to_string(&script_path)
            .ok()
            .zip(read_manifest(&manifest_path).ok());
        let Some((script, manifest)) = existing else {
            return Ok((self.generate_extension(instance)?, Generation::Generated));
        };

        let embedded_port = template::embedded_port(&script);
        let embedded_instance = template::embedded_instance_id(&script);
        if embedded_port == Some(instance.web_socket_port)
            && embedded_instance == Some(instance.instance_id.as_str())
        {
            return Ok((
                CompanionExtension {
                    extension_id: instance.manager_extension_id.clone(),
                    manifest,
                    service_worker_path: script_path,
                    extension_path: dest,
                },
                Generation::Reused,
            ));
        }

        tracing::info!(
            instance = %instance.instance_id,
            from_port = ?embedded_port,
            from_instance = ?embedded_instance,
            to_port = instance.web_socket_port,
            "companion extension is stale; regenerating"
        );
        Ok((self.generate_extension(instance)?, Generation::Regenerated))
    }
    /// Remove the companion of the given instance. Failures are logged.
    pub fn cleanup_extension(&self, instance_id: &str) {
        let Some(instance) = self.registry.get_instance(instance_id) else {
            tracing::debug!(instance = %instance_id, "no instance to clean up");
            return;
        };
        remove_dir_logged(&self.extension_path(&instance));
    }

    /// Remove every generated companion. Failures are logged.
    pub fn cleanup_all_extensions(&self) {
        remove_dir_logged(&self.output_root);
    }

    /// Remove companions whose instance is no longer running. Returns the
    /// number of directories removed.
    pub fn cleanup_stale_extensions(&self) -> usize {
        let entries = match fs::read_dir(&self.output_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(path = %self.output_root.display(), error = %e, "could not list companion extensions");
                return 0;
            }
        };

        let live: Vec<PathBuf> = self
            .registry
            .get_running_instances()
            .iter()
            .map(|instance| self.extension_path(instance))
            .collect();

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_companion = path.is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.contains("-manager-"));
            if is_companion && !live.contains(&path) && remove_dir_logged(&path) {
                removed += 1;
            }
        }
        removed
    }
}

fn read_manifest(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| ExtensionError::Read(path.to_path_buf(), e))?;
    parse_manifest(&content, path)
}

fn parse_manifest(content: &str, origin: &Path) -> Result<Value> {
    let value: Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(ExtensionError::InvalidManifest(origin.to_path_buf()));
    }
    Ok(value)
}

/// Give the manifest an identity unique to this instance.
///
/// Chromium derives the extension id from `key`; Gecko reads it from
/// `browser_specific_settings.gecko.id`.
fn embed_identity(manifest: &mut Value, instance: &InstanceRecord) -> Result<()> {
    let Some(obj) = manifest.as_object_mut() else {
        return Ok(());
    };
    match instance.browser.family() {
        EngineFamily::Chromium => {
            obj.insert("key".to_string(), Value::String(generate_key()?));
        }
        EngineFamily::Gecko => {
            let settings = obj
                .entry("browser_specific_settings")
                .or_insert_with(|| Value::Object(Map::new()));
            if !settings.is_object() {
                *settings = Value::Object(Map::new());
            }
            if let Some(settings) = settings.as_object_mut() {
                let gecko = settings.entry("gecko").or_insert_with(|| json!({}));
                if !gecko.is_object() {
                    *gecko = json!({});
                }
                if let Some(gecko) = gecko.as_object_mut() {
                    gecko.insert(
                        "id".to_string(),
                        Value::String(format!("{}@extdev", instance.manager_extension_id)),
                    );
                }
            }
        }
    }
    Ok(())
}

fn generate_key() -> Result<String> {
    let mut bytes = [0u8; KEY_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| ExtensionError::Random(e.to_string()))?;
    Ok(BASE64.encode(bytes))
}

/// Copy every template file except the manifest and script, which are
/// written separately.
fn copy_assets(template_dir: &Path, dest: &Path) -> Result<()> {
    let entries =
        fs::read_dir(template_dir).map_err(|e| ExtensionError::Read(template_dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ExtensionError::Read(template_dir.to_path_buf(), e))?;
        let name = entry.file_name();
        if name == MANIFEST || name == RELOAD_SCRIPT {
            continue;
        }
        copy_recursive(&entry.path(), &dest.join(&name))?;
    }
    Ok(())
}

fn copy_recursive(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst).map_err(|e| ExtensionError::Write(dst.to_path_buf(), e))?;
        let entries = fs::read_dir(src).map_err(|e| ExtensionError::Read(src.to_path_buf(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ExtensionError::Read(src.to_path_buf(), e))?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        fs::copy(src, dst).map_err(|e| ExtensionError::Write(dst.to_path_buf(), e))?;
    }
    Ok(())
}

fn remove_dir_logged(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove companion extension");
            false
        }
    }
}
