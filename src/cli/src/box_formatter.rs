use colored::Colorize;
use console::Emoji;
use std::fmt::Write;

const STATUS_OK: Emoji<'_, '_> = Emoji("🟢 ", "[ok] ");
const STATUS_MISSING: Emoji<'_, '_> = Emoji("🔴 ", "[--] ");
const STATUS_WARNING: Emoji<'_, '_> = Emoji("🟡 ", "[!!] ");

const LABEL_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Missing,
    Warning,
}

/// Formats a box like interface in the command line.
/// create with `BoxFormatter::new(width)`
pub struct BoxFormatter {
    output: String,
    width: usize,
}

impl BoxFormatter {
    pub fn new(width: usize) -> Self {
        Self {
            output: String::new(),
            width: width.max(LABEL_WIDTH + 8),
        }
    }

    pub fn add_header(&mut self, title: &str) {
        let _ = writeln!(
            &mut self.output,
            "┌{:─^width$}┐",
            format!(" {} ", title),
            width = self.width - 2
        );
    }

    pub fn add_footer(&mut self) {
        let _ = writeln!(&mut self.output, "└{:─^width$}┘", "", width = self.width - 2);
    }

    pub fn add_section_header(&mut self, title: &str) {
        let _ = writeln!(
            &mut self.output,
            "├{:─^width$}┤",
            format!(" {} ", title),
            width = self.width - 2
        );
    }

    pub fn add_field(&mut self, label: &str, value: &str) {
        let max_value_width = self.width - LABEL_WIDTH - 7;
        let value = if value.chars().count() > max_value_width {
            let cut: String = value.chars().take(max_value_width.saturating_sub(3)).collect();
            format!("{cut}...")
        } else {
            value.to_string()
        };

        let _ = writeln!(
            &mut self.output,
            "│ {:<LABEL_WIDTH$} │ {}",
            label,
            value.cyan()
        );
    }

    pub fn add_status_field(&mut self, label: &str, value: &str, status: Status) {
        let (emoji, value) = match status {
            Status::Ok => (STATUS_OK, value.green()),
            Status::Missing => (STATUS_MISSING, value.red()),
            Status::Warning => (STATUS_WARNING, value.yellow()),
        };

        let _ = writeln!(
            &mut self.output,
            "│ {:<LABEL_WIDTH$} │ {}{}",
            label, emoji, value
        );
    }

    pub fn get_output(&self) -> &str {
        &self.output
    }
}
