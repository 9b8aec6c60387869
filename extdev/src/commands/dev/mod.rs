//! `extdev dev`: run one development session.
//!
//! Allocates an instance, generates its companion extension, serves the
//! reload channel, and forwards project changes until a stop signal.

mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use extdev_core::InstanceRecord;
use extdev_socket::RetryPolicy;
use tokio::sync::mpsc;

use crate::addon;
use crate::config::{DevOverrides, DevSettings, ExtdevToml};
use crate::extension::{ExtensionGenerator, Generation, TemplateSource};
use crate::output;
use crate::paths;
use crate::port_manager::PortManager;
use crate::registry::InstanceRegistry;
use crate::reload::{
    ManifestFields, NoticeKey, NoticeState, ReloadConfig, ReloadServer, TerminalReporter,
    dispatch_cycle, find_manifest,
};
use crate::shutdown::{self, ShutdownSequence};

pub use watcher::{ProjectWatcher, WatcherHandle};

#[derive(Debug, Clone, Default)]
pub struct DevArgs {
    pub project: Option<PathBuf>,
    pub overrides: DevOverrides,
    pub templates: Option<PathBuf>,
    pub rdp_port: Option<u16>,
    pub devtools: bool,
}

struct Session {
    home: PathBuf,
    project: PathBuf,
    templates: TemplateSource,
    settings: DevSettings,
    registry: Arc<InstanceRegistry>,
    instance: InstanceRecord,
    sequence: Arc<ShutdownSequence>,
    rdp_port: Option<u16>,
    devtools: bool,
}

pub async fn run(args: DevArgs) -> Result<(), Box<dyn std::error::Error>> {
    let project = match args.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let project = std::fs::canonicalize(&project)?;

    let file = ExtdevToml::load_from_dir(&project)?;
    let settings = DevSettings::resolve(&file, args.overrides)?;
    let home = paths::extdev_home_dir()?;

    let registry = Arc::new(InstanceRegistry::open(&home));
    let ports = Arc::new(PortManager::new(registry.clone()));

    let alloc = {
        let ports = ports.clone();
        let project = project.clone();
        let browser = settings.browser;
        let port = settings.port;
        tokio::task::spawn_blocking(move || ports.allocate_ports(browser, &project, port)).await??
    };

    let sequence = ShutdownSequence::new();
    sequence.register(ports);
    shutdown::install_panic_hook(sequence.clone());

    let session = Session {
        home,
        project,
        templates: TemplateSource::from_override(args.templates.or_else(paths::templates_dir)),
        settings,
        registry,
        instance: alloc.instance,
        sequence: sequence.clone(),
        rdp_port: args.rdp_port,
        devtools: args.devtools,
    };
    let result = session.serve().await;
    sequence.run();
    result
}

impl Session {
    async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let generator = ExtensionGenerator::new(
            self.templates.clone(),
            paths::extensions_dir(&self.home),
            self.registry.clone(),
        );
        let (companion, generation) = generator.regenerate_extension_if_needed(&self.instance)?;

        let config = ReloadConfig {
            instance_id: self.instance.instance_id.clone(),
            port: self.instance.web_socket_port,
            heartbeat_interval: self.settings.heartbeat_interval,
            log_filter: self.settings.log_filter.clone(),
            notice_key: Some(NoticeKey {
                output_path: companion.extension_path.clone(),
                browser: self.settings.browser,
                project_path: self.project.clone(),
            }),
        };
        let server = ReloadServer::new(
            config,
            Some(self.registry.clone()),
            Arc::new(TerminalReporter),
            NoticeState::persisted(paths::notices_dir(&self.home)),
        );
        let handle = server.bind().await?;
        self.sequence.register(server.clone());

        output::section("extdev dev");
        output::step(&format!(
            "Instance {} · {}",
            output::emphasized(&self.instance.instance_id),
            self.settings.browser
        ));
        output::step(&format!(
            "HTTP port {} · reload ws://127.0.0.1:{}",
            self.instance.port,
            handle.port()
        ));
        let verb = match generation {
            Generation::Generated => "Generated",
            Generation::Regenerated => "Regenerated",
            Generation::Reused => "Reusing",
        };
        output::step(&format!(
            "{verb} companion extension at {}",
            companion.extension_path.display()
        ));
        output::muted(&format!("  profile {}", self.instance.profile_path.display()));

        if self.settings.browser.installs_over_rdp()
            && let Some(rdp_port) = self.rdp_port
        {
            let paths = vec![self.project.clone(), companion.extension_path.clone()];
            match addon::connect_and_install(rdp_port, RetryPolicy::default(), &paths, self.devtools)
                .await
            {
                Ok(installed) => {
                    for addon in installed {
                        output::success(&format!(
                            "Installed {} ({})",
                            addon.id,
                            addon.path.display()
                        ));
                    }
                }
                Err(e) => output::warning(&format!("Could not install add-ons: {e}")),
            }
        }

        let manifest_path = find_manifest(&self.project);
        let mut fields = load_fields(manifest_path.as_deref());
        if manifest_path.is_none() {
            output::warning("No manifest.json found; only HTML changes will trigger reloads");
        }

        let (cycle_tx, mut cycle_rx) = mpsc::channel::<Vec<PathBuf>>(16);
        let _watcher = ProjectWatcher::new(self.project.clone(), cycle_tx).start()?;

        let signal = shutdown::wait_for_signal();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                cycle = cycle_rx.recv() => {
                    let Some(changed) = cycle else { break };
                    if let Some(manifest) = &manifest_path
                        && changed.iter().any(|p| p == manifest)
                    {
                        fields = load_fields(Some(manifest));
                    }
                    for (path, category) in dispatch_cycle(changed.iter().map(PathBuf::as_path), &fields) {
                        let peers = server.notify_change(category)?;
                        tracing::debug!(path = %path.display(), category = %category, peers, "change dispatched");
                        if output::is_verbose() {
                            output::muted(&format!("  {category} ← {}", path.display()));
                        }
                    }
                }
                sig = &mut signal => {
                    match sig {
                        Ok(sig) => output::muted(&format!("\nReceived {sig}, shutting down...")),
                        Err(e) => tracing::warn!(error = %e, "signal listener failed"),
                    }
                    break;
                }
            }
        }

        server.close();
        let _ = tokio::time::timeout(Duration::from_secs(2), handle.wait()).await;
        Ok(())
    }
}

fn load_fields(manifest: Option<&Path>) -> ManifestFields {
    let Some(manifest) = manifest else {
        return ManifestFields::default();
    };
    match ManifestFields::from_manifest(manifest) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(path = %manifest.display(), error = %e, "could not read manifest");
            ManifestFields {
                manifest: manifest.to_path_buf(),
                ..ManifestFields::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extdev_core::ChangedFile;
    use tempfile::TempDir;

    #[test]
    fn load_fields_without_manifest_is_empty() {
        assert_eq!(load_fields(None), ManifestFields::default());
    }

    #[test]
    fn load_fields_keeps_manifest_path_when_unreadable() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("manifest.json");
        std::fs::write(&manifest, "{ broken").unwrap();

        let fields = load_fields(Some(&manifest));
        assert_eq!(fields.manifest, manifest);
        assert_eq!(
            crate::reload::classify_change(&manifest, &fields),
            Some(ChangedFile::Manifest)
        );
    }
}
