use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use extdev_core::{Browser, LogLevel};

use super::error::{ConfigError, Result};
use crate::reload::{DEFAULT_HEARTBEAT_INTERVAL, LogFilter};

pub const CONFIG_FILE: &str = "extdev.toml";

/// Project configuration from extdev.toml
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtdevToml {
    /// [dev] section - dev session defaults
    #[serde(default)]
    pub dev: DevSection,

    /// [logs] section - forwarded browser log filters
    #[serde(default)]
    pub logs: LogsSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DevSection {
    /// Browser to launch (chrome, edge, firefox, chromium-based, gecko-based)
    pub browser: Option<String>,

    /// Requested HTTP port
    pub port: Option<u16>,

    /// WebSocket heartbeat interval in seconds
    pub heartbeat_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogsSection {
    /// Minimum forwarded level
    pub level: Option<String>,

    /// Allowed contexts; "all" disables the filter
    #[serde(default)]
    pub contexts: Vec<String>,

    /// Substring the page URL must contain
    pub url: Option<String>,

    /// Only forward events from this tab
    pub tab: Option<i64>,
}

impl ExtdevToml {
    /// Load extdev.toml from a project directory. A missing file is the default config.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(path.as_ref().to_path_buf(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.browser()?;
        self.log_level()?;
        if self.dev.heartbeat_secs == Some(0) {
            return Err(ConfigError::Validation(
                "dev.heartbeat_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn browser(&self) -> Result<Option<Browser>> {
        self.dev
            .browser
            .as_deref()
            .map(|b| b.parse().map_err(|e| ConfigError::Validation(format!("dev.browser: {e}"))))
            .transpose()
    }

    pub fn log_level(&self) -> Result<Option<LogLevel>> {
        self.logs
            .level
            .as_deref()
            .map(|l| l.parse().map_err(|e| ConfigError::Validation(format!("logs.level: {e}"))))
            .transpose()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.dev
            .heartbeat_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// Values a `dev` run can take from the command line. `None` defers to the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevOverrides {
    pub browser: Option<Browser>,
    pub port: Option<u16>,
    pub log_level: Option<LogLevel>,
    pub log_contexts: Vec<String>,
    pub log_url: Option<String>,
    pub log_tab: Option<i64>,
}

/// Effective settings for a dev run: CLI flags over extdev.toml over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DevSettings {
    pub browser: Browser,
    pub port: Option<u16>,
    pub heartbeat_interval: Duration,
    pub log_filter: LogFilter,
}

impl DevSettings {
    pub fn resolve(file: &ExtdevToml, cli: DevOverrides) -> Result<Self> {
        let browser = cli.browser.or(file.browser()?).unwrap_or(Browser::Chrome);
        let contexts = if cli.log_contexts.is_empty() {
            file.logs.contexts.clone()
        } else {
            cli.log_contexts
        };

        Ok(Self {
            browser,
            port: cli.port.or(file.dev.port),
            heartbeat_interval: file.heartbeat_interval(),
            log_filter: LogFilter {
                min_level: cli.log_level.or(file.log_level()?),
                contexts,
                url: cli.log_url.or_else(|| file.logs.url.clone()),
                tab_id: cli.log_tab.or(file.logs.tab),
            },
        })
    }
}
