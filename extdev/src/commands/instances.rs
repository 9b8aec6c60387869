//! `extdev instances`: list registry records.

use extdev_core::InstanceRecord;

use crate::output;
use crate::paths;
use crate::registry::{self, InstanceRegistry};

pub fn run(all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let home = paths::extdev_home_dir()?;
    let registry = InstanceRegistry::open(&home);

    let records = if all {
        registry.all_instances()
    } else {
        registry.get_running_instances()
    };

    output::section("Instances");
    if records.is_empty() {
        output::muted(if all {
            "No instances recorded."
        } else {
            "No running instances."
        });
    }
    let now = registry::now_ms();
    for record in &records {
        println!("{}", format_row(record, now));
    }

    let stats = registry.get_stats();
    println!();
    output::muted(&format!(
        "{} total · {} running · {} terminated · {} error",
        stats.total, stats.running, stats.terminated, stats.error
    ));
    Ok(())
}

fn format_row(record: &InstanceRecord, now_ms: u64) -> String {
    format!(
        "{:<12}  {:<14}  {:>5}  {:>5}  {:<10}  {:>4}  {}",
        record.instance_id,
        record.browser.as_str(),
        record.port,
        record.web_socket_port,
        record.status.to_string(),
        output::format_age(record.age_ms(now_ms)),
        record.project_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use extdev_core::{Browser, InstanceStatus};
    use std::path::PathBuf;

    #[test]
    fn row_shows_ports_status_and_age() {
        let record = InstanceRecord {
            instance_id: "abc123def456".to_string(),
            process_id: 1,
            port: 8080,
            web_socket_port: 9000,
            browser: Browser::GeckoBased,
            manager_extension_id: "a".repeat(32),
            extension_id: None,
            profile_path: PathBuf::from("/p"),
            project_path: PathBuf::from("/work/app"),
            start_time: 0,
            status: InstanceStatus::Running,
        };
        let row = format_row(&record, 120_000);
        assert!(row.starts_with("abc123def456  gecko-based"));
        assert!(row.contains(" 8080 "));
        assert!(row.contains(" 9000 "));
        assert!(row.contains("running"));
        assert!(row.contains("2m"));
        assert!(row.ends_with("/work/app"));
    }
}
