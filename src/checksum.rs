//! Content checksums.
//!
//! Files are hashed with SHA-256 in fixed-size chunks so large files are never
//! loaded into memory at once. A file that cannot be read produces a
//! [`Checksum::Error`] instead of failing the caller.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 8192;
const ERROR_PREFIX: &str = "ERROR:";

/// A recorded content checksum.
///
/// On the wire this is a plain string: the lowercase hex digest, or
/// `ERROR:<message>` when hashing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Checksum {
    /// Hex-encoded SHA-256 digest.
    Digest(String),
    /// Hashing failed; holds the error text.
    Error(String),
}

impl Checksum {
    /// Hashes a file, recording a read failure as [`Checksum::Error`].
    pub fn of_file(path: &Path) -> Self {
        match sha256_file(path) {
            Ok(digest) => Checksum::Digest(digest),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not hash file");
                Checksum::Error(e.to_string())
            }
        }
    }

    /// Returns the digest, if hashing succeeded.
    pub fn digest(&self) -> Option<&str> {
        match self {
            Checksum::Digest(digest) => Some(digest),
            Checksum::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Checksum::Error(_))
    }
}

impl From<String> for Checksum {
    fn from(value: String) -> Self {
        match value.strip_prefix(ERROR_PREFIX) {
            Some(message) => Checksum::Error(message.to_string()),
            None => Checksum::Digest(value),
        }
    }
}

impl From<Checksum> for String {
    fn from(value: Checksum) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checksum::Digest(digest) => f.write_str(digest),
            Checksum::Error(message) => write!(f, "{}{}", ERROR_PREFIX, message),
        }
    }
}

/// Computes the hex SHA-256 digest of a file's full content.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
