//! Registry Store - the single `instances.json` file shared by every process.
//!
//! Reads degrade to an empty registry; writes are fatal to the caller.
//! Mutations run under an exclusive advisory lock and are written to a
//! temporary file that is renamed over the store, so concurrent processes
//! never observe a half-written file or lose each other's updates.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use extdev_core::Registry;

use super::{RegistryError, Result};

pub struct RegistryStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
        }
    }

    pub fn in_home(home: &Path) -> Self {
        Self::new(
            crate::paths::registry_file(home),
            crate::paths::registry_lock_file(home),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry, treating a missing or corrupt file as empty.
    pub fn load(&self) -> Registry {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Registry::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read instance registry");
                return Registry::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "instance registry is corrupt; starting empty");
                Registry::default()
            }
        }
    }

    pub fn save(&self, registry: &Registry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RegistryError::Write(parent.to_path_buf(), e))?;
        }

        let json = serde_json::to_string_pretty(registry)?;
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp, json).map_err(|e| RegistryError::Write(tmp.clone(), e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(RegistryError::Write(self.path.clone(), e));
        }
        Ok(())
    }

    /// Run one read-modify-write cycle under the store lock.
    pub fn update<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> Result<T> {
        let _lock = self.lock()?;
        let mut registry = self.load();
        let out = f(&mut registry);
        self.save(&registry)?;
        Ok(out)
    }

    pub fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.lock_path)
    }
}

/// Exclusive advisory lock on the registry; released on drop.
pub struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RegistryError::Lock(parent.to_path_buf(), e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| RegistryError::Lock(path.to_path_buf(), e))?;
        lock_exclusive(&file).map_err(|e| RegistryError::Lock(path.to_path_buf(), e))?;
        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    loop {
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use extdev_core::{Browser, InstanceRecord, InstanceStatus};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> RegistryStore {
        RegistryStore::in_home(temp.path())
    }

    fn record(id: &str) -> InstanceRecord {
        InstanceRecord {
            instance_id: id.to_string(),
            process_id: std::process::id(),
            port: 8080,
            web_socket_port: 9000,
            browser: Browser::Chrome,
            manager_extension_id: "m".repeat(32),
            extension_id: None,
            profile_path: PathBuf::from("/tmp/p"),
            project_path: PathBuf::from("/tmp/proj"),
            start_time: 1,
            status: InstanceStatus::Running,
        }
    }

    #[test]
    fn load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert_eq!(store(&temp).load(), Registry::default());
    }

    #[test]
    fn load_corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), Registry::default());
    }

    #[test]
    fn save_then_load_preserves_records() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut registry = Registry::default();
        registry.insert(record("a"));
        registry.last_cleanup = 77;

        store.save(&registry).unwrap();
        assert_eq!(store.load(), registry);

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn save_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let store = RegistryStore::new(blocker.join("instances.json"), temp.path().join("lock"));

        let err = store.save(&Registry::default()).unwrap_err();
        assert!(matches!(err, RegistryError::Write(..)));
    }

    #[test]
    fn update_persists_mutation() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let n = store
            .update(|registry| {
                registry.insert(record("a"));
                registry.insert(record("b"));
                registry.instances.len()
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.load().instances.len(), 2);
    }

    #[test]
    fn concurrent_updates_do_not_lose_writes() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let home = home.clone();
                std::thread::spawn(move || {
                    let store = RegistryStore::in_home(&home);
                    store
                        .update(|registry| registry.insert(record(&format!("id-{i}"))))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(RegistryStore::in_home(&home).load().instances.len(), 8);
    }
}
