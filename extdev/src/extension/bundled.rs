//! Companion templates compiled into the binary.

use extdev_core::EngineFamily;

/// One browser family's template: manifest, reload script, and extra files
/// keyed by their path relative to the extension root.
pub struct BundledTemplate {
    pub manifest: &'static str,
    pub script: &'static str,
    pub assets: &'static [(&'static str, &'static str)],
}

const CHROMIUM: BundledTemplate = BundledTemplate {
    manifest: include_str!("../../templates/chromium/manifest.json"),
    script: include_str!("../../templates/chromium/reload-service.js"),
    assets: &[(
        "pages/welcome.html",
        include_str!("../../templates/chromium/pages/welcome.html"),
    )],
};

const GECKO: BundledTemplate = BundledTemplate {
    manifest: include_str!("../../templates/gecko/manifest.json"),
    script: include_str!("../../templates/gecko/reload-service.js"),
    assets: &[],
};

pub fn for_family(family: EngineFamily) -> &'static BundledTemplate {
    match family {
        EngineFamily::Chromium => &CHROMIUM,
        EngineFamily::Gecko => &GECKO,
    }
}
