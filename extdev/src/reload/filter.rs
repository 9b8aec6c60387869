use extdev_core::{LogEvent, LogLevel};

/// Filters applied to forwarded browser log events.
///
/// Every configured filter must accept an event for it to be forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub min_level: Option<LogLevel>,
    /// Allowed contexts. `"all"` disables the filter.
    pub contexts: Vec<String>,
    /// Substring the event URL must contain.
    pub url: Option<String>,
    pub tab_id: Option<i64>,
}

impl LogFilter {
    pub fn accepts(&self, event: &LogEvent) -> bool {
        if let Some(min) = self.min_level
            && event.level < min
        {
            return false;
        }

        if !self.contexts.is_empty()
            && !self.contexts.iter().any(|c| c == "all")
            && !self
                .contexts
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&event.context))
        {
            return false;
        }

        if let Some(needle) = &self.url
            && !event.url.as_deref().is_some_and(|url| url.contains(needle.as_str()))
        {
            return false;
        }

        if let Some(tab) = self.tab_id
            && event.tab_id != Some(tab)
        {
            return false;
        }

        true
    }
}
