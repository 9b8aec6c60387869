use std::path::{Path, PathBuf};

/// Get extdev's application data directory.
///
/// - `EXTDEV_HOME` overrides everything.
/// - In debug builds, prefer `{repo}/debug/.extdev` when running from a source checkout.
/// - Otherwise use the OS config directory (`~/.config/extdev`,
///   `~/Library/Application Support/extdev`, `%APPDATA%\extdev`).
pub fn extdev_home_dir() -> Result<PathBuf, std::io::Error> {
    if let Ok(v) = std::env::var("EXTDEV_HOME")
        && !v.trim().is_empty()
    {
        return Ok(PathBuf::from(v));
    }

    if cfg!(debug_assertions)
        && let Ok(exe) = std::env::current_exe()
        && let Some(dev_home) = dev_extdev_home_from_exe(&exe)
    {
        return Ok(dev_home);
    }

    let config = dirs::config_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine application config directory",
        )
    })?;

    Ok(config.join("extdev"))
}

/// Registry Store file under the home directory.
pub fn registry_file(home: &Path) -> PathBuf {
    home.join("instances.json")
}

/// Advisory lock guarding registry read-modify-write cycles.
pub fn registry_lock_file(home: &Path) -> PathBuf {
    home.join("instances.lock")
}

/// Root under which companion extensions are generated.
pub fn extensions_dir(home: &Path) -> PathBuf {
    home.join("extensions")
}

pub fn profiles_dir(home: &Path) -> PathBuf {
    home.join("profiles")
}

pub fn notices_dir(home: &Path) -> PathBuf {
    home.join("notices")
}

/// Template directory replacing the companion templates built into the
/// binary, from `EXTDEV_TEMPLATES`.
pub fn templates_dir() -> Option<PathBuf> {
    std::env::var("EXTDEV_TEMPLATES")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// If `extdev` is being run from a path under a `target/` directory, return the
/// repo root directory (the parent of `target/`).
pub fn repo_root_from_exe(exe_path: &Path) -> Option<PathBuf> {
    target_dir_from_exe(exe_path)?
        .parent()
        .map(|p| p.to_path_buf())
}

/// If `extdev` is being run from a path under a `target/` directory, return that
/// `target/` directory path.
///
/// This works for:
/// - `.../target/debug/extdev`
/// - `.../target/release/extdev`
/// - `.../target/debug/deps/registry_integration-...`
pub fn target_dir_from_exe(exe_path: &Path) -> Option<PathBuf> {
    let mut cur = exe_path;
    loop {
        if cur.file_name().is_some_and(|n| n == "target") {
            return Some(cur.to_path_buf());
        }
        cur = cur.parent()?;
    }
}

/// Compute a dev-only home directory under the repo root.
///
/// Example: `{repo}/debug/.extdev`
pub fn dev_extdev_home_from_exe(exe_path: &Path) -> Option<PathBuf> {
    repo_root_from_exe(exe_path).map(|root| root.join("debug").join(".extdev"))
}
