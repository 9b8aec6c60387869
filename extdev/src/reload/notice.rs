//! First-run notices, shown once per (output path, browser, project).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use extdev_core::Browser;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeKey {
    pub output_path: PathBuf,
    pub browser: Browser,
    pub project_path: PathBuf,
}

impl NoticeKey {
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.output_path.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update(self.browser.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.project_path.to_string_lossy().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Which notices have been shown.
///
/// Owned by one Reload Server. With a marker directory the state survives
/// restarts; without one it lasts for the life of the value.
#[derive(Debug, Default)]
pub struct NoticeState {
    shown: Mutex<HashSet<String>>,
    marker_dir: Option<PathBuf>,
}

impl NoticeState {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persisted(marker_dir: impl Into<PathBuf>) -> Self {
        Self {
            shown: Mutex::new(HashSet::new()),
            marker_dir: Some(marker_dir.into()),
        }
    }

    /// Returns true the first time it is asked about `key`, false afterwards.
    pub fn should_show(&self, key: &NoticeKey) -> bool {
        let digest = key.digest();
        let Ok(mut shown) = self.shown.lock() else {
            return false;
        };
        if !shown.insert(digest.clone()) {
            return false;
        }

        let Some(dir) = &self.marker_dir else {
            return true;
        };
        let marker = dir.join(&digest);
        if marker.exists() {
            return false;
        }
        write_marker(dir, &marker);
        true
    }
}

fn write_marker(dir: &Path, marker: &Path) {
    if let Err(e) = fs::create_dir_all(dir).and_then(|()| fs::write(marker, b"")) {
        tracing::warn!(path = %marker.display(), error = %e, "failed to persist notice marker");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(browser: Browser, project: &str) -> NoticeKey {
        NoticeKey {
            output_path: PathBuf::from("/out"),
            browser,
            project_path: PathBuf::from(project),
        }
    }

    #[test]
    fn in_memory_shows_once_per_combination() {
        let state = NoticeState::in_memory();
        assert!(state.should_show(&key(Browser::Chrome, "/a")));
        assert!(!state.should_show(&key(Browser::Chrome, "/a")));
        assert!(state.should_show(&key(Browser::Firefox, "/a")));
        assert!(state.should_show(&key(Browser::Chrome, "/b")));
    }

    #[test]
    fn separate_states_do_not_share_suppression() {
        let a = NoticeState::in_memory();
        let b = NoticeState::in_memory();
        assert!(a.should_show(&key(Browser::Chrome, "/a")));
        assert!(b.should_show(&key(Browser::Chrome, "/a")));
    }

    #[test]
    fn persisted_state_survives_restart() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("notices");

        let first = NoticeState::persisted(&dir);
        assert!(first.should_show(&key(Browser::Edge, "/a")));

        let second = NoticeState::persisted(&dir);
        assert!(!second.should_show(&key(Browser::Edge, "/a")));
        assert!(second.should_show(&key(Browser::Edge, "/b")));
    }
}
