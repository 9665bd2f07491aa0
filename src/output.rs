//! Human-readable progress output.
//!
//! Everything here goes to stderr so that stdout stays free for the JSON
//! documents. Progress lines and summaries are dropped in quiet mode; errors
//! and warnings are always shown.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Per-operation outcome tags used in progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Moved,
    Restored,
    Skip,
    Fail,
    DryRun,
    Cleanup,
}

impl Tag {
    fn label(self) -> ColoredString {
        match self {
            Tag::Moved => "[MOVED]".green(),
            Tag::Restored => "[RESTORED]".green(),
            Tag::Skip => "[SKIP]".yellow(),
            Tag::Fail => "[FAIL]".red(),
            Tag::DryRun => "[DRY RUN]".yellow(),
            Tag::Cleanup => "[CLEANUP]".cyan(),
        }
    }
}

/// Writes styled messages to stderr, honoring quiet mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormatter {
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// A formatter that suppresses everything except errors and warnings.
    pub fn quiet() -> Self {
        Self::new(true)
    }

    /// Prints a success message in green with a checkmark.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", "✓".green(), message);
        }
    }

    /// Prints an error message in red with an X mark.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message.cyan());
        }
    }

    pub fn plain(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }

    pub fn header(&self, header: &str) {
        if !self.quiet {
            eprintln!("\n{}", header.bold());
        }
    }

    pub fn dry_run_notice(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", format!("[DRY RUN] {}", message).yellow());
        }
    }

    /// Starts a progress bar over `total` operations. Hidden in quiet mode.
    pub fn progress(&self, total: u64) -> Progress<'_> {
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            bar
        };
        Progress { out: self, bar }
    }

    /// Prints a table of counts per category followed by a total.
    pub fn summary_table<'a>(
        &self,
        title: &str,
        rows: impl IntoIterator<Item = (&'a str, usize)>,
        total: usize,
    ) {
        if self.quiet {
            return;
        }
        self.header(title);

        let rows: Vec<_> = rows.into_iter().collect();
        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Category".len());

        eprintln!("{:<width$} | {}", "Category".bold(), "Files".bold());
        eprintln!("{}", "-".repeat(width + 10));
        for (category, count) in &rows {
            eprintln!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word(*count)
            );
        }
        eprintln!("{}", "-".repeat(width + 10));
        eprintln!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            file_word(total)
        );
    }

    /// Prints the one-line outcome tally of an apply or rollback run.
    pub fn results(&self, verb: &str, success: usize, failed: usize, skipped: usize) {
        if self.quiet {
            return;
        }
        let failed_text = format!("{} failed", failed);
        eprintln!(
            "\nResults: {} {}, {}, {} skipped",
            success.to_string().green(),
            verb,
            if failed > 0 {
                failed_text.red()
            } else {
                failed_text.normal()
            },
            skipped
        );
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// A running progress bar with tagged status lines printed above it.
pub struct Progress<'a> {
    out: &'a OutputFormatter,
    bar: ProgressBar,
}

impl Progress<'_> {
    /// Prints a status line such as `[SKIP] a.pdf: target exists`.
    pub fn report(&self, tag: Tag, message: &str) {
        if self.out.quiet {
            return;
        }
        self.bar
            .suspend(|| eprintln!("{} {}", tag.label(), message));
    }

    pub fn advance(&self) {
        self.bar.inc(1);
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_formatter_hides_progress_bar() {
        let out = OutputFormatter::quiet();
        let progress = out.progress(10);
        assert!(progress.bar.is_hidden());
        progress.report(Tag::Moved, "suppressed");
        progress.advance();
        assert_eq!(progress.bar.position(), 1);
        progress.finish();
    }

    #[test]
    fn test_file_word() {
        assert_eq!(file_word(1), "file");
        assert_eq!(file_word(0), "files");
        assert_eq!(file_word(3), "files");
    }
}
