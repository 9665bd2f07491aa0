/// Rollback of applied plans.
///
/// Reverses the successful moves recorded in an [`ExecutionLog`], newest
/// first, using the same relocation primitive as apply. Nothing is ever
/// overwritten: a file that has since disappeared, or an original location
/// that has since been reused, is skipped with a reason.
use crate::executor::{ExecutionLog, OperationResult, RunStats, Status, display_name};
use crate::output::{OutputFormatter, Progress, Tag};
use crate::relocate::{FsRelocator, Relocator, ensure_parent, is_occupied};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

pub const FILE_NOT_FOUND: &str = "file not found at target location";
pub const ORIGINAL_OCCUPIED: &str = "original location occupied";

/// Recorded outcome of reversing one move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    /// Where the file was after apply.
    pub source: PathBuf,
    /// Where the file is restored to.
    pub target: PathBuf,
    #[serde(default)]
    pub category: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RollbackResult {
    fn new(applied: &OperationResult, status: Status) -> Self {
        Self {
            source: applied.destination.clone(),
            target: applied.source.clone(),
            category: applied.category.clone(),
            status,
            reason: None,
            error: None,
        }
    }

    fn skipped(applied: &OperationResult, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::new(applied, Status::Skipped)
        }
    }

    fn failed(applied: &OperationResult, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(applied, Status::Failed)
        }
    }
}

/// Durable record of a rollback run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackLog {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub executed_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Execution time of the apply run being reversed.
    pub original_apply: String,
    pub operations: Vec<RollbackResult>,
    pub stats: RunStats,
    /// Empty category directories removed after the rollback.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleaned_directories: Vec<PathBuf>,
}

/// Settings of one rollback run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackOptions {
    pub dry_run: bool,
    /// Remove category directories left empty. Ignored in dry-run mode.
    pub cleanup: bool,
}

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("The log from {executed_at} is from a dry run, nothing to rollback")]
    DryRunLog { executed_at: DateTime<Utc> },
}

/// Reverses apply runs.
pub struct RollbackManager<R: Relocator = FsRelocator> {
    relocator: R,
    out: OutputFormatter,
}

impl RollbackManager<FsRelocator> {
    pub fn new(out: OutputFormatter) -> Self {
        Self::with_relocator(FsRelocator, out)
    }
}

impl<R: Relocator> RollbackManager<R> {
    pub fn with_relocator(relocator: R, out: OutputFormatter) -> Self {
        Self { relocator, out }
    }

    /// Moves every successfully applied file back where it came from.
    ///
    /// Only operations with status `success` are reversed, in reverse order.
    /// Running the same rollback twice is harmless: the second run finds
    /// nothing at the applied locations and skips everything.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackError::DryRunLog`] if `log` records a dry run.
    pub fn rollback(
        &self,
        log: &ExecutionLog,
        options: RollbackOptions,
    ) -> Result<RollbackLog, RollbackError> {
        if log.dry_run {
            return Err(RollbackError::DryRunLog {
                executed_at: log.executed_at,
            });
        }

        let applied: Vec<&OperationResult> = log
            .operations
            .iter()
            .filter(|op| op.status == Status::Success)
            .collect();
        self.out
            .info(&format!("Found {} operations to rollback", applied.len()));

        let mut rollback_log = RollbackLog {
            executed_at: Utc::now(),
            dry_run: options.dry_run,
            original_apply: timestamp::format(&log.executed_at),
            operations: Vec::with_capacity(applied.len()),
            stats: RunStats::default(),
            cleaned_directories: Vec::new(),
        };

        let progress = self.out.progress(applied.len() as u64);
        for op in applied.iter().rev() {
            let result = self.restore(op, options.dry_run, &progress);
            rollback_log.stats.record(result.status);
            rollback_log.operations.push(result);
            progress.advance();
        }

        if options.cleanup && !options.dry_run {
            rollback_log.cleaned_directories = remove_empty_category_dirs(log, &progress);
        }
        progress.finish();

        Ok(rollback_log)
    }

    fn restore(&self, applied: &OperationResult, dry_run: bool, progress: &Progress<'_>) -> RollbackResult {
        let current = &applied.destination;
        let original = &applied.source;
        let name = display_name(current);

        if !is_occupied(current) {
            progress.report(Tag::Skip, &format!("{}: not found", name));
            return RollbackResult::skipped(applied, FILE_NOT_FOUND);
        }

        if is_occupied(original) {
            progress.report(Tag::Skip, &format!("{}: {}", name, ORIGINAL_OCCUPIED));
            return RollbackResult::skipped(applied, ORIGINAL_OCCUPIED);
        }

        if dry_run {
            progress.report(
                Tag::DryRun,
                &format!("{} -> {}", current.display(), original.display()),
            );
            return RollbackResult::new(applied, Status::DryRun);
        }

        let moved = ensure_parent(original)
            .and_then(|()| self.relocator.relocate(current, original));
        match moved {
            Ok(method) => {
                debug!(restored_to = %original.display(), ?method, "restored");
                let parent = original
                    .parent()
                    .map(display_name)
                    .unwrap_or_default();
                progress.report(Tag::Restored, &format!("{} -> {}/", name, parent));
                RollbackResult::new(applied, Status::Success)
            }
            Err(e) => {
                progress.report(Tag::Fail, &format!("{}: {}", name, e));
                RollbackResult::failed(applied, e.to_string())
            }
        }
    }
}

/// Removes the category directories used by `log` that are now empty.
///
/// Best-effort: a directory that is not empty or cannot be removed is left
/// alone without reporting an error.
fn remove_empty_category_dirs(log: &ExecutionLog, progress: &Progress<'_>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for op in &log.operations {
        if let Some(parent) = op.destination.parent()
            && !candidates.iter().any(|c| c == parent)
        {
            candidates.push(parent.to_path_buf());
        }
    }

    let mut removed = Vec::new();
    for dir in candidates {
        let is_dir = fs::symlink_metadata(&dir).is_ok_and(|m| m.is_dir());
        if !is_dir {
            continue;
        }
        match fs::remove_dir(&dir) {
            Ok(()) => {
                progress.report(
                    Tag::Cleanup,
                    &format!("Removed empty directory: {}", display_name(&dir)),
                );
                removed.push(dir);
            }
            Err(e) => debug!(dir = %dir.display(), error = %e, "directory kept"),
        }
    }
    removed
}
