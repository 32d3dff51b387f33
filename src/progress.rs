//! Progress reporting for a migration run
//!
//! Provides a job progress bar using indicatif, plus the header and summary
//! printed around a run.

use crate::migrate::MigrationResult;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter showing a spinner until jobs start
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Switch to a bar over `total` jobs
    pub fn start_jobs(&self, total: u64) {
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} jobs {msg}")
        {
            self.bar.set_style(bar_style.progress_chars("=> "));
        }
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    /// Update the progress display
    pub fn update(&self, summary: &MigrationResult) {
        let msg = format!(
            "| Saved: {} | Rejected: {} | Skipped: {} | Failed jobs: {} | Size: {}",
            format_number(summary.docs_saved),
            format_number(summary.docs_rejected),
            format_number(summary.fetch_errors),
            summary.jobs_failed,
            format_size(summary.bytes_submitted, BINARY),
        );

        self.bar.set_position(summary.jobs_completed as u64);
        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run
pub fn print_summary(result: &MigrationResult, destination: &str) {
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.docs_submitted as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Migration Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Started:").bold(),
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {} {} ({} excluded)",
        style("Keys:").bold(),
        format_number(result.keys_enumerated as u64),
        format_number(result.keys_excluded as u64)
    );
    println!(
        "  {} {}",
        style("Jobs:").bold(),
        format_number(result.jobs_completed as u64)
    );
    println!(
        "  {} {} ({})",
        style("Submitted:").bold(),
        format_number(result.docs_submitted),
        format_size(result.bytes_submitted, BINARY)
    );
    println!("  {} {}", style("Saved:").bold(), format_number(result.docs_saved));
    println!(
        "  {} {:.1}s ({:.0} docs/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if result.errors() > 0 {
        println!(
            "  {} {} rejected, {} skipped, {} failed jobs",
            style("Errors:").yellow().bold(),
            format_number(result.docs_rejected),
            format_number(result.fetch_errors),
            result.jobs_failed
        );
    }
    println!(
        "  {} {}",
        style("Flushed:").bold(),
        if result.flushed { "yes" } else { "no" }
    );
    println!("  {} {}", style("Destination:").bold(), destination);
    println!();
}

/// Print a header at the start of the run
pub fn print_header(source: &str, destination: &str, workers: usize, save_limit: usize) {
    println!();
    println!(
        "{} {}",
        style("kv2couch").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Destination:").bold(), destination);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Batch size:").bold(), save_limit);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }
}
