//! Intents and the resolver that derives them from user text.
//!
//! # Resolution order
//!
//! 1. Canned greetings/farewells (exact, case-insensitive) answer instantly.
//! 2. `open <name>` becomes an `open` command without a model round-trip.
//! 3. Otherwise a prompt (instruction + last turns + query) goes to the
//!    inference backend and its output is decoded as an intent document.
//! 4. Malformed output becomes a conversation reply carrying the raw text;
//!    a backend failure becomes the fixed apology.
//!
//! [`IntentResolver::resolve`] never fails.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::ContextSnapshot;
use crate::history::HistoryTurn;
use crate::inference::InferenceBackend;

/// Action parameters, ordered for stable serialization.
pub type Parameters = BTreeMap<String, String>;

/// Reply used when the backend fails.
pub const APOLOGY: &str = "I encountered an error. Please try again.";

/// Substring that marks a reply as reporting an internal failure.
pub const FAILURE_MARKER: &str = "I encountered an error";

/// Reply used when a decoded document has none.
pub const DEFAULT_REPLY: &str = "I understand your request.";

/// Number of past turns embedded in the prompt.
pub const PROMPT_HISTORY_TURNS: usize = 3;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The closed set of actions the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Open,
    Close,
    Search,
    Type,
    Click,
    Scroll,
    System,
    Browser,
    File,
    Folder,
    Media,
    Window,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::Open,
        Action::Close,
        Action::Search,
        Action::Type,
        Action::Click,
        Action::Scroll,
        Action::System,
        Action::Browser,
        Action::File,
        Action::Folder,
        Action::Media,
        Action::Window,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Search => "search",
            Self::Type => "type",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::System => "system",
            Self::Browser => "browser",
            Self::File => "file",
            Self::Folder => "folder",
            Self::Media => "media",
            Self::Window => "window",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Action::ALL
            .into_iter()
            .find(|a| a.name() == needle)
            .ok_or_else(|| s.trim().to_string())
    }
}

/// An action as named by a decoded intent: either one of the supported
/// actions, or a name outside the set that the dispatcher must reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRef {
    Supported(Action),
    Unrecognized(String),
}

impl ActionRef {
    pub fn parse(name: &str) -> Self {
        match name.parse::<Action>() {
            Ok(action) => Self::Supported(action),
            Err(raw) => Self::Unrecognized(raw),
        }
    }
}

impl From<Action> for ActionRef {
    fn from(action: Action) -> Self {
        Self::Supported(action)
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supported(action) => action.fmt(f),
            Self::Unrecognized(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Whether an intent asks for an action or just a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Command,
    Conversation,
}

/// A structured decision derived from user text.
///
/// Only commands carry an action, so "action present iff command" holds by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Command {
        action: ActionRef,
        parameters: Parameters,
        reply: String,
    },
    Conversation {
        reply: String,
    },
}

impl Intent {
    pub fn command(action: impl Into<ActionRef>, parameters: Parameters, reply: impl Into<String>) -> Self {
        Self::Command {
            action: action.into(),
            parameters,
            reply: reply.into(),
        }
    }

    pub fn conversation(reply: impl Into<String>) -> Self {
        Self::Conversation {
            reply: reply.into(),
        }
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Command { .. } => IntentKind::Command,
            Self::Conversation { .. } => IntentKind::Conversation,
        }
    }

    pub fn action(&self) -> Option<&ActionRef> {
        match self {
            Self::Command { action, .. } => Some(action),
            Self::Conversation { .. } => None,
        }
    }

    pub fn reply(&self) -> &str {
        match self {
            Self::Command { reply, .. } | Self::Conversation { reply } => reply,
        }
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        match self {
            Self::Command { parameters, .. } => Some(parameters),
            Self::Conversation { .. } => None,
        }
    }
}

/// Stored body of a learned skill: an action to dispatch and what to say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub action: Action,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub reply: Option<String>,
}

impl ActionTemplate {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            parameters: Parameters::new(),
            reply: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn to_intent(&self) -> Intent {
        Intent::command(
            self.action,
            self.parameters.clone(),
            self.reply.clone().unwrap_or_default(),
        )
    }
}

// ---------------------------------------------------------------------------
// Wire decoding
// ---------------------------------------------------------------------------

/// The intent document as the model writes it. Every field is optional so
/// partial documents still decode.
#[derive(Debug, Deserialize)]
struct WireIntent {
    #[serde(default, alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default, alias = "params")]
    parameters: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, alias = "response")]
    reply: Option<String>,
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("code fence pattern is valid")
});

/// Pull the JSON object out of model output that may wrap it in prose or
/// markdown fences.
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    if body.starts_with('{') {
        return Some(body);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

fn stringify(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Decode model output into an intent. `None` means the output is not a
/// usable intent document.
pub fn decode_intent(raw: &str) -> Option<Intent> {
    let wire: WireIntent = serde_json::from_str(extract_json(raw)?).ok()?;
    let reply = wire
        .reply
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REPLY.to_string());

    let kind = match wire.kind.as_deref().map(|k| k.trim().to_lowercase()) {
        None => IntentKind::Conversation,
        Some(k) if k == "command" => IntentKind::Command,
        Some(k) if k == "conversation" => IntentKind::Conversation,
        Some(_) => return None,
    };

    let action = wire.action.filter(|a| !a.trim().is_empty());
    match (kind, action) {
        (IntentKind::Command, Some(action)) => {
            let parameters = wire
                .parameters
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, stringify(v)))
                .collect();
            Some(Intent::command(ActionRef::parse(&action), parameters, reply))
        }
        _ => Some(Intent::conversation(reply)),
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

const CANNED_REPLIES: &[(&str, &str)] = &[
    ("hello", "Hello! How can I help?"),
    ("hi", "Hi there!"),
    ("hey", "Hey! What can I do for you?"),
    ("thanks", "You're welcome!"),
    ("thank you", "You're welcome!"),
    ("bye", "Goodbye!"),
    ("goodbye", "Goodbye!"),
];

/// Canned reply for an exact greeting or farewell.
pub fn canned_reply(text: &str) -> Option<&'static str> {
    let lower = text.trim().to_lowercase();
    CANNED_REPLIES
        .iter()
        .find(|(phrase, _)| *phrase == lower)
        .map(|(_, reply)| *reply)
}

const SYSTEM_INSTRUCTION: &str = "You are a desktop voice assistant. \
Decide whether the user wants an action performed on their computer or just a reply. \
Answer with a single JSON object and nothing else: \
{\"kind\": \"command\" | \"conversation\", \"action\": string, \"parameters\": object, \"reply\": string}. \
Include \"action\" and \"parameters\" only for commands. \
Valid actions: open, close, search, type, click, scroll, system, browser, file, folder, media, window. \
Keep \"reply\" short and conversational.";

/// Turns free-form text into an [`Intent`].
pub struct IntentResolver {
    backend: Box<dyn InferenceBackend>,
}

impl IntentResolver {
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    pub fn resolve(&self, text: &str, context: &ContextSnapshot, history: &[&HistoryTurn]) -> Intent {
        if let Some(reply) = canned_reply(text) {
            return Intent::conversation(reply);
        }

        if let Some(intent) = open_shortcut(text) {
            return intent;
        }

        let prompt = build_prompt(text, history);
        match self.backend.process_query(&prompt, context) {
            Ok(raw) => decode_intent(&raw).unwrap_or_else(|| {
                tracing::debug!(raw = %raw, "inference output is not an intent document");
                let raw = raw.trim();
                if raw.is_empty() {
                    Intent::conversation(APOLOGY)
                } else {
                    Intent::conversation(raw)
                }
            }),
            Err(e) => {
                tracing::warn!(error = %e, "inference failed, apologising");
                Intent::conversation(APOLOGY)
            }
        }
    }
}

impl fmt::Debug for IntentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentResolver").finish_non_exhaustive()
    }
}

/// `open <name>` → open command, the one action common enough to skip the model.
fn open_shortcut(text: &str) -> Option<Intent> {
    let lower = text.trim().to_lowercase();
    let name = lower.strip_prefix("open ")?.trim();
    if name.is_empty() {
        return None;
    }
    let mut parameters = Parameters::new();
    parameters.insert("name".into(), name.to_string());
    Some(Intent::command(Action::Open, parameters, format!("Opening {name}.")))
}

/// Assemble the prompt: instruction, the last few turns, then the query.
pub fn build_prompt(text: &str, history: &[&HistoryTurn]) -> String {
    let mut prompt = String::from(SYSTEM_INSTRUCTION);
    prompt.push_str("\n\n");

    let skip = history.len().saturating_sub(PROMPT_HISTORY_TURNS);
    for turn in &history[skip..] {
        prompt.push_str(&format!("User: {}\nAssistant: {}\n", turn.user, turn.assistant));
    }

    prompt.push_str(&format!("User: {}\nAssistant:", text.trim()));
    prompt
}
