//! Command history: the bounded conversation log.
//!
//! Stores (user input, assistant reply) turns for prompt context and
//! persists them after every turn so the next session picks up where this
//! one stopped.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::persist::{JsonDocument, StoreResult, now_secs};

/// Default number of turns retained.
pub const DEFAULT_MAX_TURNS: usize = 50;

/// A single conversation turn (user input + assistant reply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub user: String,
    pub assistant: String,
    /// Seconds since UNIX epoch.
    pub timestamp: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryState {
    #[serde(default)]
    turns: Vec<HistoryTurn>,
}

#[derive(Serialize)]
struct HistoryStateRef<'a> {
    turns: &'a VecDeque<HistoryTurn>,
}

/// Ordered turns with oldest-first eviction.
#[derive(Debug)]
pub struct CommandHistory {
    turns: VecDeque<HistoryTurn>,
    max_turns: usize,
    document: Option<JsonDocument>,
}

impl CommandHistory {
    pub fn in_memory(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
            document: None,
        }
    }

    pub fn open(path: impl Into<PathBuf>, max_turns: usize) -> Self {
        let document = JsonDocument::new(path);
        let state: HistoryState = document.load_or_default();
        let mut history = Self {
            document: Some(document),
            ..Self::in_memory(max_turns)
        };
        history.turns = state.turns.into();
        history.evict();
        history
    }

    /// Add a turn, evicting the oldest if at capacity, and save.
    pub fn push(&mut self, user: &str, assistant: &str) {
        self.turns.push_back(HistoryTurn {
            user: user.to_string(),
            assistant: assistant.to_string(),
            timestamp: now_secs(),
        });
        self.evict();

        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to save command history");
        }
    }

    /// The newest `n` turns, oldest first.
    pub fn last(&self, n: usize) -> Vec<&HistoryTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn flush(&self) -> StoreResult<()> {
        let Some(document) = &self.document else {
            return Ok(());
        };
        document.write(&HistoryStateRef { turns: &self.turns })
    }

    fn evict(&mut self) {
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::in_memory(DEFAULT_MAX_TURNS)
    }
}
