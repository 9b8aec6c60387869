//! Project watcher for `extdev dev`.
//!
//! Each debounced batch of filesystem events is forwarded as one watch cycle.

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEBOUNCE: Duration = Duration::from_millis(150);

/// Directories whose contents never trigger a reload.
const IGNORED_DIRS: [&str; 5] = [".git", "node_modules", "target", ".extdev", "dist"];

/// Handle that keeps the watcher alive
pub struct WatcherHandle {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    _thread: std::thread::JoinHandle<()>,
}

/// Watches a project tree recursively.
pub struct ProjectWatcher {
    project_dir: PathBuf,
    cycle_tx: mpsc::Sender<Vec<PathBuf>>,
}

impl ProjectWatcher {
    pub fn new(project_dir: PathBuf, cycle_tx: mpsc::Sender<Vec<PathBuf>>) -> Self {
        Self {
            project_dir,
            cycle_tx,
        }
    }

    pub fn start(self) -> Result<WatcherHandle, Box<dyn std::error::Error>> {
        let (tx, rx) = std_mpsc::channel();
        let mut debouncer = new_debouncer(DEBOUNCE, tx)?;

        debouncer
            .watcher()
            .watch(&self.project_dir, RecursiveMode::Recursive)?;

        let cycle_tx = self.cycle_tx;
        let project_dir = self.project_dir;
        let handle = std::thread::spawn(move || {
            for result in rx {
                match result {
                    Ok(events) => {
                        let paths: Vec<PathBuf> = events
                            .into_iter()
                            .map(|event| event.path)
                            .filter(|path| !is_ignored(&project_dir, path))
                            .collect();
                        if !paths.is_empty() && cycle_tx.blocking_send(paths).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = ?e, "watch error");
                    }
                }
            }
        });

        Ok(WatcherHandle {
            _debouncer: debouncer,
            _thread: handle,
        })
    }
}

fn is_ignored(project_dir: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(project_dir).unwrap_or(path);
    rel.components().any(|c| match c {
        Component::Normal(name) => IGNORED_DIRS.iter().any(|d| name == *d),
        _ => false,
    })
}
