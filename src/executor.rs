/// Plan execution.
///
/// The executor walks a [`MovePlan`] in order and moves each file to its
/// planned destination, recording one [`OperationResult`] per operation in an
/// [`ExecutionLog`]. That log is the only record rollback has of what really
/// happened, so no per-file problem aborts the run: a vanished source or an
/// occupied destination is `skipped`, an I/O error is `failed`, and the next
/// operation proceeds.
use crate::checksum::{Checksum, sha256_file};
use crate::document::{self, DocumentError};
use crate::output::{OutputFormatter, Progress, Tag};
use crate::planner::{MoveOperation, MovePlan};
use crate::relocate::{FsRelocator, Relocator, ensure_parent, is_occupied};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const SOURCE_NOT_FOUND: &str = "source not found";
pub const TARGET_EXISTS: &str = "target exists";
pub const HASH_MISMATCH: &str = "Hash mismatch after move";

/// Outcome of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Skipped,
    Failed,
    /// Would have succeeded; nothing was changed.
    DryRun,
}

/// Outcome counts of an apply or rollback run.
///
/// Dry-run outcomes count as `success`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Success | Status::DryRun => self.success += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    pub fn from_statuses(statuses: impl IntoIterator<Item = Status>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.record(status);
        }
        stats
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }
}

/// Recorded outcome of one planned move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub source: PathBuf,
    #[serde(rename = "target")]
    pub destination: PathBuf,
    pub category: String,
    pub status: Status,
    /// Why the operation was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Error text of a failed operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on success when the destination was re-hashed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl OperationResult {
    fn new(op: &MoveOperation, status: Status) -> Self {
        Self {
            source: op.source.clone(),
            destination: op.destination.clone(),
            category: op.category.clone(),
            status,
            reason: None,
            error: None,
            hash_verified: None,
            warning: None,
        }
    }

    fn skipped(op: &MoveOperation, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::new(op, Status::Skipped)
        }
    }

    fn failed(op: &MoveOperation, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(op, Status::Failed)
        }
    }
}

/// Durable record of an apply run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub executed_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Creation time of the plan that was applied, as written in the plan.
    pub plan_source: String,
    pub operations: Vec<OperationResult>,
    pub stats: RunStats,
}

impl ExecutionLog {
    fn record(&mut self, result: OperationResult) {
        self.stats.record(result.status);
        self.operations.push(result);
    }
}

/// Settings of one apply run.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
    /// Re-hash moved files that carry a checksum from the scan.
    pub verify_hash: bool,
    /// Where to persist the partial log after every operation. Ignored in
    /// dry-run mode.
    pub checkpoint: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The log could not be persisted. `log` holds every operation that ran,
    /// including the one whose record failed to save.
    #[error("Failed to checkpoint execution log: {source}")]
    Checkpoint {
        log: Box<ExecutionLog>,
        #[source]
        source: DocumentError,
    },
}

/// Applies move plans.
pub struct Executor<R: Relocator = FsRelocator> {
    relocator: R,
    out: OutputFormatter,
}

impl Executor<FsRelocator> {
    pub fn new(out: OutputFormatter) -> Self {
        Self::with_relocator(FsRelocator, out)
    }
}

impl<R: Relocator> Executor<R> {
    pub fn with_relocator(relocator: R, out: OutputFormatter) -> Self {
        Self { relocator, out }
    }

    /// Executes every operation of `plan` in order.
    ///
    /// # Errors
    ///
    /// Only a failed checkpoint write is an error. The empty log is written
    /// before anything is touched, so an unwritable checkpoint path moves
    /// nothing. A later failure stops the run before the next operation and
    /// hands back the partial log. Per-operation problems are reported in the
    /// returned log.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyplan::document;
    /// use tidyplan::executor::{ApplyOptions, Executor};
    /// use tidyplan::output::OutputFormatter;
    /// use tidyplan::planner::MovePlan;
    /// use std::path::Path;
    ///
    /// let plan: MovePlan = document::load(Path::new("plan.json")).unwrap();
    /// let executor = Executor::new(OutputFormatter::default());
    /// let log = executor.apply(&plan, &ApplyOptions::default()).unwrap();
    /// assert_eq!(log.stats.total(), plan.operations.len());
    /// ```
    pub fn apply(&self, plan: &MovePlan, options: &ApplyOptions) -> Result<ExecutionLog, ApplyError> {
        let mut log = ExecutionLog {
            executed_at: Utc::now(),
            dry_run: options.dry_run,
            plan_source: timestamp::format(&plan.created_at),
            operations: Vec::with_capacity(plan.operations.len()),
            stats: RunStats::default(),
        };

        let checkpoint = options.checkpoint.as_deref().filter(|_| !options.dry_run);
        if let Some(path) = checkpoint
            && let Err(source) = document::save(path, &log)
        {
            return Err(ApplyError::Checkpoint {
                log: Box::new(log),
                source,
            });
        }

        self.prepare_category_dirs(plan, options.dry_run);

        let progress = self.out.progress(plan.operations.len() as u64);
        for op in &plan.operations {
            log.record(self.execute(op, options, &progress));
            progress.advance();

            if let Some(path) = checkpoint
                && let Err(source) = document::save(path, &log)
            {
                progress.finish();
                return Err(ApplyError::Checkpoint {
                    log: Box::new(log),
                    source,
                });
            }
        }
        progress.finish();

        Ok(log)
    }

    /// Creates the category directories the plan needs, in plan order.
    ///
    /// Failures are only warned about; the affected operations fail on their
    /// own when their parent directory cannot be created.
    fn prepare_category_dirs(&self, plan: &MovePlan, dry_run: bool) {
        let mut seen: Vec<&str> = Vec::new();
        for op in &plan.operations {
            if seen.contains(&op.category.as_str()) {
                continue;
            }
            seen.push(&op.category);

            let dir = plan.target_base.join(&op.category);
            if dir.is_dir() {
                continue;
            }
            if dry_run {
                self.out
                    .dry_run_notice(&format!("Would create directory: {}", dir.display()));
            } else if let Err(e) = fs::create_dir_all(&dir) {
                warn!(dir = %dir.display(), error = %e, "could not create category directory");
                self.out.warning(&format!(
                    "Could not create directory {}: {}",
                    dir.display(),
                    e
                ));
            }
        }
    }

    fn execute(&self, op: &MoveOperation, options: &ApplyOptions, progress: &Progress<'_>) -> OperationResult {
        let name = display_name(&op.source);

        if !is_regular_file(&op.source) {
            progress.report(Tag::Skip, &format!("{}: {}", name, SOURCE_NOT_FOUND));
            return OperationResult::skipped(op, SOURCE_NOT_FOUND);
        }

        if is_occupied(&op.destination) {
            progress.report(Tag::Skip, &format!("{}: {}", name, TARGET_EXISTS));
            return OperationResult::skipped(op, TARGET_EXISTS);
        }

        if options.dry_run {
            progress.report(Tag::DryRun, &format!("{} -> {}/", name, op.category));
            return OperationResult::new(op, Status::DryRun);
        }

        let moved = ensure_parent(&op.destination)
            .and_then(|()| self.relocator.relocate(&op.source, &op.destination));
        match moved {
            Ok(method) => debug!(source = %op.source.display(), ?method, "moved"),
            Err(e) => {
                progress.report(Tag::Fail, &format!("{}: {}", name, e));
                return OperationResult::failed(op, e.to_string());
            }
        }

        let mut result = OperationResult::new(op, Status::Success);
        if options.verify_hash
            && let Some(expected) = op.sha256.as_ref().and_then(Checksum::digest)
        {
            match sha256_file(&op.destination) {
                Ok(actual) if actual == expected => result.hash_verified = Some(true),
                Ok(_) => {
                    result.hash_verified = Some(false);
                    result.warning = Some(HASH_MISMATCH.to_string());
                }
                Err(e) => {
                    result.hash_verified = Some(false);
                    result.warning = Some(format!("Could not verify hash: {}", e));
                }
            }
            if result.hash_verified == Some(false) {
                warn!(destination = %op.destination.display(), "hash verification failed");
            }
        }

        progress.report(Tag::Moved, &format!("{} -> {}/", name, op.category));
        result
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_file())
}

/// File name of a path for progress lines.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
