//! Skill store: deterministic command shortcuts tried before inference.
//!
//! Two tiers, searched in order: built-in skills (fixed, see [`builtin`])
//! and learned skills (taught at runtime, persisted as an ordered JSON
//! array). A skill matches when any of its trigger patterns is a substring
//! of the lowercased command; the first match wins.

pub mod builtin;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dispatch::{ActionDispatcher, ActionResult};
use crate::error::{SkillError, SkillResult};
use crate::intent::{Action, ActionTemplate};
use crate::persist::{JsonDocument, now_secs};

pub use builtin::{BuiltinSkill, builtin_skills};

/// Which tier a skill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillTier {
    Builtin,
    Learned,
}

impl std::fmt::Display for SkillTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => write!(f, "built-in"),
            Self::Learned => write!(f, "learned"),
        }
    }
}

/// A skill taught at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    /// Lowercased trigger patterns.
    pub patterns: Vec<String>,
    pub template: ActionTemplate,
    /// Seconds since UNIX epoch.
    pub learned_at: u64,
}

impl SkillDefinition {
    fn matches(&self, lower: &str) -> bool {
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

/// A matched skill: its name and tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillMatch {
    pub name: String,
    pub tier: SkillTier,
}

/// Summary row for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillSummary {
    pub name: String,
    pub tier: SkillTier,
    pub patterns: Vec<String>,
    pub action: Option<Action>,
    pub learned_at: Option<u64>,
}

/// Built-in and learned skills, with optional JSON persistence for the
/// learned tier.
#[derive(Debug)]
pub struct SkillStore {
    builtins: Vec<BuiltinSkill>,
    learned: Vec<SkillDefinition>,
    document: Option<JsonDocument>,
}

impl SkillStore {
    pub fn in_memory() -> Self {
        Self {
            builtins: builtin_skills(),
            learned: Vec::new(),
            document: None,
        }
    }

    /// Open the store, loading learned skills from `path` if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let document = JsonDocument::new(path);
        let learned: Vec<SkillDefinition> = document.load_or_default();
        tracing::debug!(count = learned.len(), "loaded learned skills");
        Self {
            builtins: builtin_skills(),
            learned,
            document: Some(document),
        }
    }

    pub fn has_skill_for(&self, command: &str) -> bool {
        self.find(command).is_some()
    }

    /// The first skill whose trigger occurs in `command`.
    pub fn find(&self, command: &str) -> Option<SkillMatch> {
        let lower = command.to_lowercase();
        self.builtins
            .iter()
            .find(|b| b.matches(&lower))
            .map(|b| SkillMatch {
                name: b.name.to_string(),
                tier: SkillTier::Builtin,
            })
            .or_else(|| {
                self.learned.iter().find(|s| s.matches(&lower)).map(|s| SkillMatch {
                    name: s.name.clone(),
                    tier: SkillTier::Learned,
                })
            })
    }

    /// Run the matching skill through `dispatcher`.
    pub fn execute(&self, command: &str, dispatcher: &ActionDispatcher) -> SkillResult<ActionResult> {
        let lower = command.to_lowercase();

        let (skill, template) = if let Some(builtin) = self.builtins.iter().find(|b| b.matches(&lower)) {
            let template = (builtin.handler)(&lower).ok_or_else(|| SkillError::Unhandled {
                skill: builtin.name.to_string(),
                command: command.to_string(),
            })?;
            (builtin.name.to_string(), template)
        } else if let Some(learned) = self.learned.iter().find(|s| s.matches(&lower)) {
            (learned.name.clone(), learned.template.clone())
        } else {
            return Err(SkillError::NoMatch {
                command: command.to_string(),
            });
        };

        let result = dispatcher.dispatch(&template.to_intent());
        if result.success {
            tracing::info!(skill = %skill, action = %template.action, "skill executed");
            Ok(result)
        } else {
            Err(SkillError::Execution {
                skill,
                message: result.message,
            })
        }
    }

    /// Teach a skill. An existing skill with the same name is replaced in
    /// place. The learned table is saved immediately.
    pub fn learn(
        &mut self,
        name: &str,
        patterns: &[String],
        template: ActionTemplate,
    ) -> SkillResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SkillError::Invalid {
                name: name.to_string(),
                message: "name is empty".into(),
            });
        }
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if patterns.is_empty() {
            return Err(SkillError::Invalid {
                name: name.to_string(),
                message: "no trigger patterns".into(),
            });
        }

        let definition = SkillDefinition {
            name: name.to_string(),
            patterns,
            template,
            learned_at: now_secs(),
        };
        match self.learned.iter_mut().find(|s| s.name == name) {
            Some(existing) => *existing = definition,
            None => self.learned.push(definition),
        }
        tracing::info!(skill = name, "learned skill");

        self.flush()?;
        Ok(())
    }

    /// Remove a learned skill and save.
    pub fn forget(&mut self, name: &str) -> SkillResult<()> {
        let idx = self
            .learned
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| SkillError::NotFound { name: name.into() })?;
        self.learned.remove(idx);
        self.flush()?;
        Ok(())
    }

    pub fn learned(&self) -> &[SkillDefinition] {
        &self.learned
    }

    pub fn list(&self) -> Vec<SkillSummary> {
        let builtins = self.builtins.iter().map(|b| SkillSummary {
            name: b.name.to_string(),
            tier: SkillTier::Builtin,
            patterns: b.patterns.iter().map(|p| p.to_string()).collect(),
            action: None,
            learned_at: None,
        });
        let learned = self.learned.iter().map(|s| SkillSummary {
            name: s.name.clone(),
            tier: SkillTier::Learned,
            patterns: s.patterns.clone(),
            action: Some(s.template.action),
            learned_at: Some(s.learned_at),
        });
        builtins.chain(learned).collect()
    }

    pub fn flush(&self) -> SkillResult<()> {
        if let Some(document) = &self.document {
            document.write(&self.learned)?;
        }
        Ok(())
    }
}

impl Default for SkillStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
