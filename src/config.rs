//! Assistant configuration, persisted as TOML in
//! `$XDG_CONFIG_HOME/voxa/config.toml`.
//!
//! Every field has a serde default, so a partial file (or none at all) is
//! valid.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::DEFAULT_MAX_TURNS;
use crate::inference::OllamaConfig;
use crate::memory::DEFAULT_MAX_RECORDS;

/// Errors from reading or writing the config file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(voxa::config::read),
        help("Ensure the config file exists and is readable, or run `voxa init`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(voxa::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(voxa::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// When false no server is contacted and only canned replies,
    /// shortcuts and skills work.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechSection {
    /// External text-to-speech command, e.g. `"espeak"` or `"say"`. The
    /// reply is passed as the last argument. Unset prints to stdout.
    #[serde(default)]
    pub say_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Unset keeps every entry for the session.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySection {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationSection {
    /// Log actions instead of performing them.
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub inference: InferenceSection,
    #[serde(default)]
    pub speech: SpeechSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub automation: AutomationSection,
}

fn default_base_url() -> String {
    OllamaConfig::default().base_url
}
fn default_model() -> String {
    OllamaConfig::default().model
}
fn default_timeout_secs() -> u64 {
    OllamaConfig::default().timeout_secs
}
fn default_true() -> bool {
    true
}
fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}
fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            enabled: true,
        }
    }
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
        }
    }
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

impl InferenceSection {
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

impl AssistantConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AssistantConfig::default();
        assert_eq!(config.inference.base_url, "http://localhost:11434");
        assert!(config.inference.enabled);
        assert_eq!(config.memory.max_records, 1000);
        assert_eq!(config.history.max_turns, 50);
        assert_eq!(config.cache.max_entries, None);
        assert!(config.automation.dry_run);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: AssistantConfig = toml::from_str(
            r#"
            [inference]
            model = "mistral"

            [cache]
            max_entries = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.inference.model, "mistral");
        assert_eq!(config.inference.timeout_secs, 60);
        assert_eq!(config.cache.max_entries, Some(64));
        assert_eq!(config.memory.max_records, 1000);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AssistantConfig::default();
        config.speech.say_command = Some("espeak".into());
        config.automation.dry_run = false;
        config.save(&path).unwrap();

        let loaded = AssistantConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AssistantConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AssistantConfig::default());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[inference\nmodel = ").unwrap();
        assert!(matches!(
            AssistantConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let section = InferenceSection {
            base_url: "http://gpu-box:11434/".into(),
            ..Default::default()
        };
        assert_eq!(section.ollama_config().base_url, "http://gpu-box:11434");
    }
}
