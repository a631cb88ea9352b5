//! JSON state documents: one file per store, rewritten in full on every save.
//!
//! Loading is best-effort. A missing file yields the default value silently;
//! an unreadable or corrupt file is logged and also yields the default, so a
//! damaged document never keeps the assistant from starting.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Result type for document persistence.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the document.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn read<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Load the document, falling back to `T::default()` on any failure.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self) -> T {
        match self.read() {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(error = %e, "state document unreadable, starting empty");
                T::default()
            }
        }
    }

    /// Serialize `value` and replace the document's contents.
    pub fn write<T: Serialize>(&self, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        std::fs::write(&self.path, json).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

/// Seconds since the UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
