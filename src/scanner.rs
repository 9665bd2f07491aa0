//! Directory scanning and classification.
//!
//! The scanner lists the regular files directly inside one directory,
//! assigns each a category from the [`CategoryTable`] it was given, and
//! optionally records a content checksum. Its [`ScanResult`] is the input
//! document of the planner.

use crate::checksum::Checksum;
use crate::config::CompiledFilters;
use crate::file_category::{CategoryMap, CategoryTable};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// One scanned file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base name, e.g. `report.pdf`.
    pub name: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Extension including the leading dot, or empty.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub modified: DateTime<Utc>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Checksum>,
}

/// Count and total size of the files in one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub size: u64,
}

/// Aggregate statistics of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub total_size: u64,
    /// Only categories that received at least one file.
    pub by_category: CategoryMap<CategoryStats>,
}

/// Result of scanning a directory.
///
/// Every category of the table appears in `files`, in table order, even when
/// no file matched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub scan_time: DateTime<Utc>,
    /// Absolute path of the scanned directory.
    pub directory: PathBuf,
    pub stats: ScanStats,
    pub files: CategoryMap<Vec<FileRecord>>,
}

impl ScanResult {
    /// Iterates over every record, category by category.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().flat_map(|(_, records)| records.iter())
    }
}

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Error reading directory {}: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },
}

/// Scans one directory level and classifies its files.
pub struct Scanner<'a> {
    table: &'a CategoryTable,
    filters: Option<&'a CompiledFilters>,
    include_hash: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(table: &'a CategoryTable) -> Self {
        Self {
            table,
            filters: None,
            include_hash: false,
        }
    }

    /// Restricts the scan to files accepted by `filters`.
    pub fn with_filters(mut self, filters: &'a CompiledFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Enables SHA-256 checksums for every scanned file.
    pub fn with_hash(mut self, include_hash: bool) -> Self {
        self.include_hash = include_hash;
        self
    }

    /// Scans `directory` (non-recursively).
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`] for a
    /// bad path, and [`ScanError::ReadDir`] if the listing itself fails.
    /// Problems with individual entries are logged and the entry is skipped;
    /// an unreadable file only yields an error checksum.
    pub fn scan(&self, directory: &Path) -> Result<ScanResult, ScanError> {
        let read_dir_error = |e: io::Error| ScanError::ReadDir {
            path: directory.to_path_buf(),
            source: e,
        };

        let metadata = fs::metadata(directory).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ScanError::NotFound(directory.to_path_buf())
            } else {
                read_dir_error(e)
            }
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(directory.to_path_buf()));
        }

        let directory = std::path::absolute(directory).map_err(read_dir_error)?;
        let entries = fs::read_dir(&directory).map_err(read_dir_error)?;

        let mut files: CategoryMap<Vec<FileRecord>> = CategoryMap::new();
        for name in self.table.category_names() {
            files.insert(name, Vec::new());
        }

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(directory = %directory.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if let Some(record) = self.scan_entry(&entry)
                && let Some(bucket) = files.get_mut(&record.category)
            {
                bucket.push(record);
            }
        }

        let stats = compute_stats(&files);
        Ok(ScanResult {
            scan_time: Utc::now(),
            directory,
            stats,
            files,
        })
    }

    /// Builds the record for one directory entry, or `None` if the entry is
    /// not part of the scan.
    fn scan_entry(&self, entry: &DirEntry) -> Option<FileRecord> {
        let path = entry.path();

        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => {}
            Ok(_) => {
                debug!(path = %path.display(), "skipping non-regular entry");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping entry with unknown type");
                return None;
            }
        }

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(path = %path.display(), "skipping file with a non UTF-8 name");
            return None;
        };

        if let Some(filters) = self.filters
            && !filters.should_include(&name)
        {
            debug!(file = %name, "excluded by filters");
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file without metadata");
                return None;
            }
        };
        let modified = match metadata.modified() {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file without modification time");
                return None;
            }
        };

        let extension = Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let category = self.table.classify(&extension).to_string();
        let sha256 = self.include_hash.then(|| Checksum::of_file(&path));

        Some(FileRecord {
            name,
            path,
            extension,
            size: metadata.len(),
            modified,
            category,
            sha256,
        })
    }
}

fn compute_stats(files: &CategoryMap<Vec<FileRecord>>) -> ScanStats {
    let mut stats = ScanStats::default();
    for (category, records) in files.iter() {
        if records.is_empty() {
            continue;
        }
        let size: u64 = records.iter().map(|r| r.size).sum();
        stats.total_files += records.len();
        stats.total_size += size;
        stats.by_category.insert(
            category,
            CategoryStats {
                count: records.len(),
                size,
            },
        );
    }
    stats
}
