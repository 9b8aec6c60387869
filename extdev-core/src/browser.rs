use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Remote-debugging ports are derived from this base plus a per-browser offset.
pub const DEBUG_PORT_BASE: u16 = 9222;

/// Engine family a browser target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFamily {
    Chromium,
    Gecko,
}

/// Browser an instance targets.
///
/// Everything that differs per browser is carried as data on the variant so
/// callers look it up once instead of matching on browser names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Browser {
    Chrome,
    Edge,
    Firefox,
    ChromiumBased,
    GeckoBased,
}

struct BrowserSpec {
    name: &'static str,
    family: EngineFamily,
    debug_port_offset: u16,
}

impl Browser {
    pub const ALL: [Browser; 5] = [
        Browser::Chrome,
        Browser::Edge,
        Browser::Firefox,
        Browser::ChromiumBased,
        Browser::GeckoBased,
    ];

    fn spec(self) -> BrowserSpec {
        match self {
            Browser::Chrome => BrowserSpec {
                name: "chrome",
                family: EngineFamily::Chromium,
                debug_port_offset: 0,
            },
            Browser::Edge => BrowserSpec {
                name: "edge",
                family: EngineFamily::Chromium,
                debug_port_offset: 1,
            },
            Browser::Firefox => BrowserSpec {
                name: "firefox",
                family: EngineFamily::Gecko,
                debug_port_offset: 2,
            },
            Browser::ChromiumBased => BrowserSpec {
                name: "chromium-based",
                family: EngineFamily::Chromium,
                debug_port_offset: 3,
            },
            Browser::GeckoBased => BrowserSpec {
                name: "gecko-based",
                family: EngineFamily::Gecko,
                debug_port_offset: 4,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn family(self) -> EngineFamily {
        self.spec().family
    }

    /// Name of the template directory the companion extension is built from.
    pub fn template_dir(self) -> &'static str {
        match self.family() {
            EngineFamily::Chromium => "chromium",
            EngineFamily::Gecko => "gecko",
        }
    }

    pub fn default_debug_port(self) -> u16 {
        DEBUG_PORT_BASE + self.spec().debug_port_offset
    }

    /// Gecko browsers load the companion as a temporary add-on over the
    /// remote debugging protocol; chromium browsers load it from disk.
    pub fn installs_over_rdp(self) -> bool {
        self.family() == EngineFamily::Gecko
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown browser '{0}' (expected one of: chrome, edge, firefox, chromium-based, gecko-based)")]
pub struct UnknownBrowser(pub String);

impl FromStr for Browser {
    type Err = UnknownBrowser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Browser::ALL
            .into_iter()
            .find(|b| b.as_str() == wanted)
            .ok_or_else(|| UnknownBrowser(s.to_string()))
    }
}
