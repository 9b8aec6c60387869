//! `extdev cleanup`: sweep orphaned instances and their companions.

use std::sync::Arc;

use crate::extension::{ExtensionGenerator, TemplateSource};
use crate::output;
use crate::paths;
use crate::registry::InstanceRegistry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let home = paths::extdev_home_dir()?;
    let registry = Arc::new(InstanceRegistry::open(&home));

    let report = registry.cleanup_orphans()?;
    let generator =
        ExtensionGenerator::new(TemplateSource::Bundled, paths::extensions_dir(&home), registry);
    let companions = generator.cleanup_stale_extensions();

    output::success(&format!(
        "Removed {} instance record(s), marked {} dead instance(s) terminated, removed {} companion extension(s)",
        report.removed.len(),
        report.marked_terminated.len(),
        companions
    ));
    if output::is_verbose() {
        for id in &report.removed {
            output::muted(&format!("  removed {id}"));
        }
        for id in &report.marked_terminated {
            output::muted(&format!("  terminated {id}"));
        }
    }
    Ok(())
}
