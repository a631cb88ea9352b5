//! Context tracker: bounded rolling conversational state.
//!
//! Keeps the last few commands, a coarse topic and intent classification,
//! and a bounded history of snapshots. Classification is keyword-based:
//! categories are tried in a fixed order and the first one with a keyword
//! contained in the command wins. When nothing matches, the previous value
//! is kept.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::persist::{JsonDocument, StoreResult, now_secs};
use crate::similarity;

/// Maximum number of commands kept in `recent_commands`.
pub const MAX_RECENT_COMMANDS: usize = 5;

/// Maximum number of snapshots kept in the history.
pub const MAX_HISTORY: usize = 10;

/// Coarse conversation topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    System,
    Browser,
    Media,
    File,
    App,
    Utility,
}

impl Topic {
    /// Classification order.
    pub const ALL: [Topic; 6] = [
        Topic::System,
        Topic::Browser,
        Topic::Media,
        Topic::File,
        Topic::App,
        Topic::Utility,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::System => &["open", "close", "restart", "shutdown", "launch"],
            Self::Browser => &["search", "browse", "website", "internet", "google"],
            Self::Media => &["play", "pause", "volume", "music", "video"],
            Self::File => &["create", "delete", "save", "document", "folder"],
            Self::App => &["application", "program", "software", "install"],
            Self::Utility => &["calculator", "notepad", "paint", "terminal"],
        }
    }
}

/// What the user is trying to do, in broad strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentClass {
    Action,
    Query,
    Control,
    Navigation,
}

impl IntentClass {
    /// Classification order.
    pub const ALL: [IntentClass; 4] = [
        IntentClass::Action,
        IntentClass::Query,
        IntentClass::Control,
        IntentClass::Navigation,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Action => &["open", "close", "start", "stop", "create", "delete"],
            Self::Query => &["what", "how", "why", "when", "where", "who"],
            Self::Control => &["increase", "decrease", "adjust", "set", "change"],
            Self::Navigation => &["go to", "move to", "switch to", "back to"],
        }
    }
}

/// First category in `order` with a keyword contained in `lower`.
fn first_match<T: Copy>(
    order: &[T],
    keywords: impl Fn(T) -> &'static [&'static str],
    lower: &str,
) -> Option<T> {
    order
        .iter()
        .copied()
        .find(|category| keywords(*category).iter().any(|kw| lower.contains(kw)))
}

/// Classify a command's topic. `None` if no topic keyword appears.
pub fn classify_topic(command: &str) -> Option<Topic> {
    first_match(&Topic::ALL, Topic::keywords, &command.to_lowercase())
}

/// Classify a command's intent class. `None` if no intent keyword appears.
pub fn classify_intent(command: &str) -> Option<IntentClass> {
    first_match(&IntentClass::ALL, IntentClass::keywords, &command.to_lowercase())
}

/// Bounded summary of recent conversational state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Seconds since UNIX epoch of the last update.
    pub timestamp: u64,
    #[serde(default)]
    pub active_app: Option<String>,
    /// Most recent commands, oldest first.
    #[serde(default)]
    pub recent_commands: Vec<String>,
    #[serde(default)]
    pub topic: Option<Topic>,
    #[serde(default)]
    pub intent_class: Option<IntentClass>,
    #[serde(default)]
    pub system_state: BTreeMap<String, String>,
}

impl ContextSnapshot {
    /// An empty snapshot stamped with the current time.
    pub fn fresh() -> Self {
        Self {
            timestamp: now_secs(),
            ..Default::default()
        }
    }
}

/// On-disk layout of the context document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ContextState {
    current_context: ContextSnapshot,
    #[serde(default)]
    history: Vec<ContextSnapshot>,
    #[serde(default)]
    last_updated: u64,
}

/// Owns the current snapshot and its bounded history.
#[derive(Debug)]
pub struct ContextTracker {
    current: ContextSnapshot,
    history: VecDeque<ContextSnapshot>,
    document: Option<JsonDocument>,
}

impl ContextTracker {
    /// A tracker that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            current: ContextSnapshot::fresh(),
            history: VecDeque::with_capacity(MAX_HISTORY),
            document: None,
        }
    }

    /// Open a tracker backed by a JSON document, restoring saved state.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let document = JsonDocument::new(path);
        let state: Option<ContextState> = match document.read() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "context state unreadable, starting empty");
                None
            }
        };

        let mut tracker = Self {
            document: Some(document),
            ..Self::in_memory()
        };
        if let Some(state) = state {
            tracker.current = state.current_context;
            trim_front(&mut tracker.current.recent_commands, MAX_RECENT_COMMANDS);
            let skip = state.history.len().saturating_sub(MAX_HISTORY);
            tracker.history = state.history.into_iter().skip(skip).collect();
        }
        tracker
    }

    /// Record a new command and re-classify the context.
    pub fn update(&mut self, command: &str) {
        self.current.timestamp = now_secs();
        self.current.recent_commands.push(command.to_string());
        trim_front(&mut self.current.recent_commands, MAX_RECENT_COMMANDS);

        if let Some(topic) = classify_topic(command) {
            self.current.topic = Some(topic);
        }
        if let Some(intent) = classify_intent(command) {
            self.current.intent_class = Some(intent);
        }

        self.history.push_back(self.current.clone());
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        self.save_logged();
    }

    /// Whether two commands are close enough to share context.
    pub fn is_similar(&self, cmd1: &str, cmd2: &str) -> bool {
        similarity::is_same(cmd1, cmd2)
    }

    /// Copy of the current snapshot.
    pub fn get_current(&self) -> ContextSnapshot {
        self.current.clone()
    }

    /// Snapshot history, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &ContextSnapshot> {
        self.history.iter()
    }

    /// Merge key/value pairs into the system state.
    pub fn update_system_state<I, K, V>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.current
            .system_state
            .extend(updates.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.save_logged();
    }

    /// Set or clear the application currently in focus.
    pub fn set_active_app(&mut self, app: Option<String>) {
        if self.current.active_app != app {
            self.current.active_app = app;
            self.save_logged();
        }
    }

    /// Reset to an empty snapshot and empty history.
    pub fn clear(&mut self) {
        self.current = ContextSnapshot::fresh();
        self.history.clear();
        self.save_logged();
    }

    /// Write the full context document now.
    pub fn flush(&self) -> StoreResult<()> {
        let Some(document) = &self.document else {
            return Ok(());
        };
        document.write(&ContextStateRef {
            current_context: &self.current,
            history: &self.history,
            last_updated: now_secs(),
        })
    }

    fn save_logged(&self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to save context state");
        }
    }
}

/// Borrowing twin of [`ContextState`] so saves don't clone the history.
#[derive(Serialize)]
struct ContextStateRef<'a> {
    current_context: &'a ContextSnapshot,
    history: &'a VecDeque<ContextSnapshot>,
    last_updated: u64,
}

fn trim_front<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        let excess = items.len() - max;
        items.drain(..excess);
    }
}
