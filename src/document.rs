//! Persistence for the JSON documents passed between pipeline stages.
//!
//! Writes go through a temporary file in the target directory that is renamed
//! into place, so a reader never observes a half-written document.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while reading or writing a pipeline document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Malformed document {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Reads and parses a document.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            DocumentError::NotFound(path.to_path_buf())
        } else {
            DocumentError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    serde_json::from_str(&content).map_err(|e| DocumentError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Renders a document as pretty-printed JSON.
pub fn to_json<T: Serialize>(document: &T) -> Result<String, DocumentError> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Atomically writes a document, replacing any previous file at `path`.
pub fn save<T: Serialize>(path: &Path, document: &T) -> Result<(), DocumentError> {
    let json = to_json(document)?;
    let write_error = |e: io::Error| DocumentError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut staged = NamedTempFile::new_in(dir).map_err(write_error)?;
    staged.write_all(json.as_bytes()).map_err(write_error)?;
    staged.write_all(b"\n").map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;
    staged.persist(path).map_err(|e| write_error(e.error))?;

    Ok(())
}
