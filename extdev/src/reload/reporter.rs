use extdev_core::{LogEvent, ManagementInfo};

use super::notice::NoticeKey;
use crate::output;

/// Human summary printed once a connection completes the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadySummary {
    pub instance_id: String,
    pub extension_id: String,
    pub management: ManagementInfo,
    pub web_socket_port: u16,
}

/// Sink for human-facing reload events.
pub trait Reporter: Send + Sync {
    fn client_ready(&self, summary: &ReadySummary);
    fn first_run_notice(&self, key: &NoticeKey);
    fn log_event(&self, event: &LogEvent);
}

/// Prints to the terminal through [`crate::output`].
#[derive(Debug, Default)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn client_ready(&self, summary: &ReadySummary) {
        let name = if summary.management.name.is_empty() {
            summary.extension_id.as_str()
        } else {
            summary.management.name.as_str()
        };
        output::success(&format!(
            "{} {} connected",
            output::emphasized(name),
            summary.management.version
        ));
        output::muted(&format!(
            "  extension {} · instance {} · ws://127.0.0.1:{}",
            summary.extension_id, summary.instance_id, summary.web_socket_port
        ));
    }

    fn first_run_notice(&self, key: &NoticeKey) {
        output::section("First run");
        output::step(&format!(
            "Loading {} into {} from {}",
            key.project_path.display(),
            key.browser,
            key.output_path.display()
        ));
        output::muted("  Browser console output from the extension will appear below.");
    }

    fn log_event(&self, event: &LogEvent) {
        let mut line = format!(
            "{} {} {}",
            output::level_tag(event.level),
            output::brand_muted(format!("[{}]", event.context)),
            event.message()
        );
        if output::is_verbose()
            && let Some(url) = &event.url
        {
            line.push_str(&format!(" {}", output::brand_muted(url)));
        }
        println!("{line}");
    }
}
