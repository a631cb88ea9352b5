//! XDG-compliant path resolution for voxa.
//!
//! Config lives in `$XDG_CONFIG_HOME/voxa/` and the four state documents in
//! `$XDG_DATA_HOME/voxa/`. The data directory can be overridden from the
//! command line. Logs go to stderr.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(voxa::paths::no_home),
        help("Set the HOME environment variable, or pass --data-dir and --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(voxa::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

pub const CONTEXT_FILE: &str = "context_state.json";
pub const MEMORY_FILE: &str = "memory_state.json";
pub const SKILLS_FILE: &str = "learned_skills.json";
pub const HISTORY_FILE: &str = "command_history.json";

/// Directories voxa reads and writes.
#[derive(Debug, Clone)]
pub struct VoxaPaths {
    /// `$XDG_CONFIG_HOME/voxa/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/voxa/`
    pub data_dir: PathBuf,
}

impl VoxaPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("voxa");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("voxa");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Everything under one root; used for `--data-dir` and tests.
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            data_dir: root.to_path_buf(),
        }
    }

    /// Replace the data directory, keeping the rest.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn context_file(&self) -> PathBuf {
        self.data_dir.join(CONTEXT_FILE)
    }

    pub fn memory_file(&self) -> PathBuf {
        self.data_dir.join(MEMORY_FILE)
    }

    pub fn skills_file(&self) -> PathBuf {
        self.data_dir.join(SKILLS_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }
}
