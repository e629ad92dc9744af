//! Message formatting and display.
//!
//! User-facing progress text, with support for quiet and verbose modes.
//! Diagnostics from the library go through `tracing` instead.

use std::io::{self, IsTerminal};

use pdfjoin::config::Config;
use pdfjoin::io::{LoadResult, LoadStatistics};

/// Level of output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Informational message.
    Info,
    /// Success message.
    Success,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
    /// Debug/verbose message.
    Debug,
}

/// Output formatter with configurable verbosity.
#[derive(Debug)]
pub struct OutputFormatter {
    quiet: bool,
    verbose: bool,
    colored: bool,
}

impl OutputFormatter {
    /// Create a new output formatter.
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            colored: Self::should_use_color(),
        }
    }

    /// Create a formatter from configuration.
    ///
    /// A dry run prints its report even in quiet mode.
    pub fn from_config(config: &Config) -> Self {
        Self::new(!config.should_print(), config.verbose)
    }

    /// Create a quiet formatter (only errors).
    pub fn quiet() -> Self {
        Self::new(true, false)
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self::new(false, true)
    }

    fn should_use_color() -> bool {
        io::stdout().is_terminal() && std::env::var("TERM").is_ok()
    }

    /// Print an informational message. Suppressed in quiet mode.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Info, message);
        }
    }

    /// Print a success message. Suppressed in quiet mode.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Success, message);
        }
    }

    /// Print a warning message, even in quiet mode.
    pub fn warning(&self, message: &str) {
        self.print_message(MessageLevel::Warning, message);
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        self.print_message(MessageLevel::Error, message);
    }

    /// Print a debug message. Only displayed in verbose mode.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            self.print_message(MessageLevel::Debug, message);
        }
    }

    fn print_message(&self, level: MessageLevel, message: &str) {
        let (prefix, color_code) = match level {
            MessageLevel::Info => ("", ""),
            MessageLevel::Success => ("✓ ", "\x1b[32m"), // Green
            MessageLevel::Warning => ("⚠ ", "\x1b[33m"), // Yellow
            MessageLevel::Error => ("✗ ", "\x1b[31m"),   // Red
            MessageLevel::Debug => ("→ ", "\x1b[36m"),   // Cyan
        };

        let reset = "\x1b[0m";

        if self.colored && !color_code.is_empty() {
            println!("{color_code}{prefix}{message}{reset}");
        } else {
            println!("{prefix}{message}");
        }
    }

    /// Print a section header. Suppressed in quiet mode.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n{title}");
        }
    }

    /// Print a labelled value. Only shown in verbose mode.
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            println!("  {label}: {value}");
        }
    }

    /// Print a blank line. Suppressed in quiet mode.
    pub fn blank_line(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Print a numbered list item. Suppressed in quiet mode.
    pub fn list_item(&self, index: usize, message: &str) {
        if !self.quiet {
            println!("  {index}. {message}");
        }
    }

    /// True unless in quiet mode.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }

    /// Check if verbose output should be shown.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

/// One line per input: pages, version and size, or the load error.
pub fn display_inputs(formatter: &OutputFormatter, results: &[LoadResult]) {
    for (index, result) in results.iter().enumerate() {
        match result {
            Ok(loaded) => {
                formatter.list_item(
                    index + 1,
                    &format!(
                        "{} ({} pages, PDF {}, {})",
                        loaded.path.display(),
                        loaded.page_count,
                        loaded.document.version_string(),
                        pdfjoin::merge::format_file_size(loaded.file_size)
                    ),
                );
                formatter.detail("Objects", &loaded.document.object_count().to_string());
                formatter.detail(
                    "Cross-reference sections",
                    &loaded.document.xref_sections().to_string(),
                );
                if loaded.document.is_recovered() {
                    formatter.warning(&format!(
                        "{}: cross-reference table was rebuilt",
                        loaded.path.display()
                    ));
                }
            }
            Err(err) => formatter.error(&err.to_string()),
        }
    }
}

/// Display load statistics to the user.
pub fn display_load_statistics(formatter: &OutputFormatter, stats: &LoadStatistics) {
    if stats.failure_count > 0 {
        formatter.warning(&format!(
            "{} file(s) failed to load",
            stats.failure_count
        ));
    }

    formatter.info(&format!(
        "Loaded {} file(s) in {:.2}s: {} pages, {}",
        stats.success_count,
        stats.total_time.as_secs_f64(),
        stats.total_pages,
        stats.format_total_size()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_new_formatter() {
        let formatter = OutputFormatter::new(false, false);
        assert!(!formatter.is_quiet());
        assert!(!formatter.is_verbose());
        assert!(formatter.should_print());
    }

    #[test]
    fn test_quiet_formatter() {
        let formatter = OutputFormatter::quiet();
        assert!(formatter.is_quiet());
        assert!(!formatter.should_print());
    }

    #[test]
    fn test_verbose_formatter() {
        let formatter = OutputFormatter::verbose();
        assert!(formatter.is_verbose());
        assert!(formatter.should_print());
    }

    #[test]
    fn test_from_config_dry_run_overrides_quiet() {
        let mut config = Config::new(
            vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
            "out.pdf",
        );
        config.quiet = true;
        assert!(OutputFormatter::from_config(&config).is_quiet());

        config.dry_run = true;
        assert!(!OutputFormatter::from_config(&config).is_quiet());
    }

    #[test]
    fn test_messages_do_not_panic() {
        for formatter in [OutputFormatter::quiet(), OutputFormatter::verbose()] {
            formatter.info("info");
            formatter.success("success");
            formatter.warning("warning");
            formatter.error("error");
            formatter.debug("debug");
            formatter.section("Section");
            formatter.detail("Label", "value");
            formatter.list_item(1, "item");
            formatter.blank_line();
        }
    }

    #[test]
    fn test_display_inputs_with_error() {
        let results: Vec<LoadResult> = vec![Err(pdfjoin::PdfJoinError::file_not_found(
            PathBuf::from("missing.pdf"),
        )
        .for_input(0, None))];
        display_inputs(&OutputFormatter::quiet(), &results);
    }
}
