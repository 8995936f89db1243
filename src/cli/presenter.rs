//! CLI presenter for output formatting

use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::AuditReport;
use crate::domain::recording::MetadataRecord;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.red} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Format one listing row: marker, name, creation time, description
    pub fn format_record(&self, record: &MetadataRecord) -> String {
        let marker = if record.is_recording() { "●" } else { " " };
        format!(
            "{} {}  {}  {}",
            marker.red(),
            record.name,
            record.created_at.dimmed(),
            record.description
        )
    }

    /// Print a recording listing to stdout
    pub fn recordings(&self, records: &[MetadataRecord]) {
        for record in records {
            println!("{}", self.format_record(record));
        }
    }

    /// Print an audit report; findings go to stdout, the verdict to stderr
    pub fn audit(&self, report: &AuditReport) {
        for name in &report.records_without_files {
            println!("{} {}", "missing-file".yellow(), name);
        }
        for name in &report.files_without_records {
            println!("{} {}", "orphan-file".yellow(), name);
        }
        for name in &report.in_progress {
            println!("{} {}", "in-progress".cyan(), name);
        }

        if report.is_consistent() {
            self.success("Records and audio files are consistent");
        } else {
            self.warn(&format!(
                "{} record(s) without audio, {} file(s) without a record",
                report.records_without_files.len(),
                report.files_without_records.len()
            ));
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
