//! Move plan generation.
//!
//! Turns a [`ScanResult`] into an ordered list of moves into
//! `target_base/<category>/<name>`. Destination names are made unique
//! against each other and against whatever already exists on disk when the
//! plan is generated. The apply step re-checks every destination, since the
//! filesystem can change in between.

use crate::checksum::Checksum;
use crate::file_category::CategoryMap;
use crate::relocate::is_occupied;
use crate::scanner::ScanResult;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Action of a planned operation. Only moves exist today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Move,
}

/// One planned move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOperation {
    #[serde(default)]
    pub action: Action,
    pub source: PathBuf,
    #[serde(rename = "target")]
    pub destination: PathBuf,
    pub category: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Checksum>,
}

/// Aggregate statistics of a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub total_moves: usize,
    pub by_category: CategoryMap<usize>,
}

/// An ordered set of moves, generated before anything is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    pub source_directory: PathBuf,
    /// Absolute directory the category folders live in.
    pub target_base: PathBuf,
    pub operations: Vec<MoveOperation>,
    pub stats: PlanStats,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid target directory {}: {source}", path.display())]
    InvalidTarget { path: PathBuf, source: io::Error },
}

/// Generates a move plan for every file in `scan`.
///
/// Categories are visited in the order they appear in the scan, and files in
/// their scan order. Empty categories produce no operations.
///
/// # Examples
///
/// ```no_run
/// use tidyplan::file_category::CategoryTable;
/// use tidyplan::planner::generate_plan;
/// use tidyplan::scanner::Scanner;
/// use std::path::Path;
///
/// let table = CategoryTable::default();
/// let scan = Scanner::new(&table).scan(Path::new("/home/me/Downloads")).unwrap();
/// let plan = generate_plan(&scan, Path::new("/home/me/Downloads/Organized")).unwrap();
/// println!("{} files to move", plan.stats.total_moves);
/// ```
pub fn generate_plan(scan: &ScanResult, target_base: &Path) -> Result<MovePlan, PlanError> {
    let target_base = std::path::absolute(target_base).map_err(|e| PlanError::InvalidTarget {
        path: target_base.to_path_buf(),
        source: e,
    })?;

    let mut reserved = HashSet::new();
    let mut operations = Vec::new();
    let mut stats = PlanStats::default();

    for (category, records) in scan.files.iter() {
        if records.is_empty() {
            continue;
        }

        let category_dir = target_base.join(category);
        stats.by_category.insert(category, records.len());

        for record in records {
            let destination = unique_destination(&category_dir, &record.name, &mut reserved);
            operations.push(MoveOperation {
                action: Action::Move,
                source: record.path.clone(),
                destination,
                category: category.to_string(),
                size: record.size,
                sha256: record.sha256.clone(),
            });
        }
    }

    stats.total_moves = operations.len();
    Ok(MovePlan {
        created_at: Utc::now(),
        source_directory: scan.directory.clone(),
        target_base,
        operations,
        stats,
    })
}

/// Picks `dir/name`, or `dir/<stem>_<n><ext>` with the lowest free `n`, and
/// reserves it.
fn unique_destination(dir: &Path, name: &str, reserved: &mut HashSet<PathBuf>) -> PathBuf {
    let is_free = |path: &Path, reserved: &HashSet<PathBuf>| {
        !reserved.contains(path) && !is_occupied(path)
    };

    let mut candidate = dir.join(name);
    if !is_free(&candidate, reserved) {
        let original = Path::new(name);
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = original
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1u64;
        loop {
            candidate = dir.join(format!("{}_{}{}", stem, counter, suffix));
            if is_free(&candidate, reserved) {
                break;
            }
            counter += 1;
        }
        debug!(
            file = name,
            destination = %candidate.display(),
            "destination taken, using numbered name"
        );
    }

    reserved.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::CategoryTable;
    use crate::scanner::{FileRecord, ScanStats, Scanner};
    use std::fs;
    use tempfile::TempDir;

    fn record(dir: &Path, name: &str, category: &str) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: dir.join(name),
            extension: Path::new(name)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            size: 1,
            modified: Utc::now(),
            category: category.to_string(),
            sha256: None,
        }
    }

    fn scan_of(dir: &Path, buckets: Vec<(&str, Vec<FileRecord>)>) -> ScanResult {
        let mut files = CategoryMap::new();
        for (category, records) in buckets {
            files.insert(category, records);
        }
        ScanResult {
            scan_time: Utc::now(),
            directory: dir.to_path_buf(),
            stats: ScanStats::default(),
            files,
        }
    }

    #[test]
    fn test_plan_moves_into_category_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("src");
        let target = temp_dir.path().join("target");
        let scan = scan_of(
            &source,
            vec![
                ("Documents", vec![record(&source, "a.pdf", "Documents")]),
                ("Images", vec![]),
                ("Other", vec![record(&source, "README", "Other")]),
            ],
        );

        let plan = generate_plan(&scan, &target).unwrap();

        assert_eq!(plan.operations.len(), 2);
        assert_eq!(
            plan.operations[0].destination,
            target.join("Documents").join("a.pdf")
        );
        assert_eq!(plan.operations[1].destination, target.join("Other").join("README"));
        assert_eq!(plan.stats.total_moves, 2);
        assert_eq!(
            plan.stats.by_category.keys().collect::<Vec<_>>(),
            vec!["Documents", "Other"]
        );
        assert_eq!(plan.target_base, target);
    }

    #[test]
    fn test_plan_suffixes_existing_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("src");
        let target = temp_dir.path().join("target");
        fs::create_dir_all(target.join("Documents")).unwrap();
        fs::write(target.join("Documents").join("a.pdf"), "old").unwrap();
        fs::write(target.join("Documents").join("a_1.pdf"), "old").unwrap();

        let scan = scan_of(
            &source,
            vec![(
                "Documents",
                vec![
                    record(&source, "a.pdf", "Documents"),
                    record(&source, "b.pdf", "Documents"),
                ],
            )],
        );

        let plan = generate_plan(&scan, &target).unwrap();

        assert_eq!(
            plan.operations[0].destination,
            target.join("Documents").join("a_2.pdf")
        );
        assert_eq!(
            plan.operations[1].destination,
            target.join("Documents").join("b.pdf")
        );
    }

    #[test]
    fn test_plan_destinations_unique_within_plan() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let target = temp_dir.path().join("target");
        let first = temp_dir.path().join("one");
        let second = temp_dir.path().join("two");
        let scan = scan_of(
            &first,
            vec![(
                "Documents",
                vec![
                    record(&first, "same.txt", "Documents"),
                    record(&second, "same.txt", "Documents"),
                    record(&second, "same_1.txt", "Documents"),
                ],
            )],
        );

        let plan = generate_plan(&scan, &target).unwrap();
        let destinations: Vec<_> = plan.operations.iter().map(|op| &op.destination).collect();

        assert_eq!(destinations[0], &target.join("Documents").join("same.txt"));
        assert_eq!(destinations[1], &target.join("Documents").join("same_1.txt"));
        assert_eq!(destinations[2], &target.join("Documents").join("same_1_1.txt"));
        let unique: HashSet<_> = destinations.iter().collect();
        assert_eq!(unique.len(), destinations.len());
    }

    #[test]
    fn test_suffix_keeps_last_extension_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("Archives");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("backup.tar.gz"), "x").unwrap();
        fs::write(dir.join("Makefile"), "x").unwrap();

        let mut reserved = HashSet::new();
        assert_eq!(
            unique_destination(&dir, "backup.tar.gz", &mut reserved),
            dir.join("backup.tar_1.gz")
        );
        assert_eq!(
            unique_destination(&dir, "Makefile", &mut reserved),
            dir.join("Makefile_1")
        );
    }

    #[test]
    fn test_plan_carries_size_and_checksum() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut rec = record(temp_dir.path(), "x.zip", "Archives");
        rec.size = 42;
        rec.sha256 = Some(Checksum::Digest("abc".to_string()));
        let scan = scan_of(temp_dir.path(), vec![("Archives", vec![rec])]);

        let plan = generate_plan(&scan, &temp_dir.path().join("t")).unwrap();

        assert_eq!(plan.operations[0].size, 42);
        assert_eq!(
            plan.operations[0].sha256,
            Some(Checksum::Digest("abc".to_string()))
        );
    }

    #[test]
    fn test_plan_covers_every_scanned_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("src");
        fs::create_dir(&source).unwrap();
        for name in ["a.pdf", "b.png", "c.mp4", "d.zip", "e.rs", "f.exe", "g.mp3", "h.bin"] {
            fs::write(source.join(name), name).unwrap();
        }

        let table = CategoryTable::default();
        let scan = Scanner::new(&table).scan(&source).unwrap();
        let plan = generate_plan(&scan, &temp_dir.path().join("target")).unwrap();

        assert_eq!(plan.operations.len(), scan.stats.total_files);
        assert_eq!(plan.stats.by_category.len(), 8);
    }

    #[test]
    fn test_plan_json_uses_target_field() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let scan = scan_of(
            temp_dir.path(),
            vec![("Code", vec![record(temp_dir.path(), "main.rs", "Code")])],
        );
        let plan = generate_plan(&scan, &temp_dir.path().join("t")).unwrap();

        let value = serde_json::to_value(&plan).unwrap();
        let op = &value["operations"][0];
        assert_eq!(op["action"], "move");
        assert!(op["target"].as_str().unwrap().ends_with("main.rs"));
        assert!(op.get("sha256").is_none());
        assert_eq!(value["stats"]["total_moves"], 1);
    }
}
