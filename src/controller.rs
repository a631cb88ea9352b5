//! Turn controller: the listen → decide → act → learn loop.
//!
//! One turn runs to completion before the next utterance is read. The
//! controller owns every store, so nothing here is shared except the
//! shutdown flag.
//!
//! ```text
//! Idle → Listening → Received → CacheCheck ─hit──────────────────────────→ Respond → Idle
//!                                   └─miss→ SkillCheck ─match→ Execute ─┐
//!                                               └─none→ Resolve → Dispatch ┤
//!                               Respond ← CacheWrite ← ContextUpdate ← Learn
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::ResponseCache;
use crate::config::AssistantConfig;
use crate::context::{ContextSnapshot, ContextTracker};
use crate::dispatch::ActionDispatcher;
use crate::error::{VoxaError, VoxaResult};
use crate::history::CommandHistory;
use crate::intent::{Action, ActionRef, FAILURE_MARKER, Intent, IntentResolver, PROMPT_HISTORY_TURNS};
use crate::memory::InteractionMemory;
use crate::paths::VoxaPaths;
use crate::skills::SkillStore;
use crate::speech::{SpeechInput, SpeechOutput};

pub const GREETING: &str = "Hello! I'm ready to help.";
pub const FAREWELL: &str = "Goodbye!";

/// Where the controller is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Listening,
    Received,
    CacheCheck,
    SkillCheck,
    Resolve,
    Dispatch,
    Execute,
    Learn,
    ContextUpdate,
    CacheWrite,
    Respond,
    ShuttingDown,
}

/// Which path produced a turn's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Skill,
    Dispatch,
    Conversation,
}

/// Result of one handled utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub response: String,
    pub success: bool,
    pub source: ResponseSource,
}

/// The adaptive state a controller owns.
#[derive(Debug)]
pub struct Stores {
    pub skills: SkillStore,
    pub memory: InteractionMemory,
    pub context: ContextTracker,
    pub history: CommandHistory,
    pub cache: ResponseCache,
}

impl Stores {
    /// Stores that never touch the filesystem.
    pub fn in_memory(config: &AssistantConfig) -> Self {
        Self {
            skills: SkillStore::in_memory(),
            memory: InteractionMemory::in_memory(config.memory.max_records),
            context: ContextTracker::in_memory(),
            history: CommandHistory::in_memory(config.history.max_turns),
            cache: ResponseCache::with_limit(config.cache.max_entries),
        }
    }

    /// Stores backed by the documents in the data directory.
    pub fn open(paths: &VoxaPaths, config: &AssistantConfig) -> Self {
        Self {
            skills: SkillStore::open(paths.skills_file()),
            memory: InteractionMemory::open(paths.memory_file(), config.memory.max_records),
            context: ContextTracker::open(paths.context_file()),
            history: CommandHistory::open(paths.history_file(), config.history.max_turns),
            cache: ResponseCache::with_limit(config.cache.max_entries),
        }
    }

    /// Save every persisted store. Every store is attempted; failures are
    /// logged and the first one is returned.
    pub fn flush(&self) -> VoxaResult<()> {
        let results: [(&str, VoxaResult<()>); 4] = [
            ("interaction memory", self.memory.flush().map_err(VoxaError::from)),
            ("context", self.context.flush().map_err(VoxaError::from)),
            ("learned skills", self.skills.flush().map_err(VoxaError::from)),
            ("command history", self.history.flush().map_err(VoxaError::from)),
        ];
        let mut first = None;
        for (store, result) in results {
            if let Err(e) = result {
                tracing::warn!(error = %e, store, "failed to save");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// Drives turns from speech input to speech output.
pub struct TurnController {
    stores: Stores,
    resolver: IntentResolver,
    dispatcher: ActionDispatcher,
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    shutdown: Arc<AtomicBool>,
    state: TurnState,
}

impl TurnController {
    pub fn new(
        stores: Stores,
        resolver: IntentResolver,
        dispatcher: ActionDispatcher,
        input: Box<dyn SpeechInput>,
        output: Box<dyn SpeechOutput>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            stores,
            resolver,
            dispatcher,
            input,
            output,
            shutdown,
            state: TurnState::Idle,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn stores_mut(&mut self) -> &mut Stores {
        &mut self.stores
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run one turn for `text` and return the reply without speaking it.
    pub fn handle_text(&mut self, text: &str) -> TurnOutcome {
        let text = text.trim();
        self.state = TurnState::Received;
        tracing::debug!(text, "utterance received");

        self.state = TurnState::CacheCheck;
        if let Some(cached) = self.stores.cache.lookup(text) {
            tracing::debug!(text, "cache hit");
            let outcome = TurnOutcome {
                response: cached.to_string(),
                success: true,
                source: ResponseSource::Cache,
            };
            self.state = TurnState::Respond;
            return outcome;
        }

        self.state = TurnState::SkillCheck;
        let (outcome, intent) = if self.stores.skills.has_skill_for(text) {
            self.state = TurnState::Execute;
            (self.execute_skill(text), None)
        } else {
            self.state = TurnState::Resolve;
            let intent = {
                let history = self.stores.history.last(PROMPT_HISTORY_TURNS);
                let context = self.stores.context.get_current();
                self.resolver.resolve(text, &context, &history)
            };
            self.state = TurnState::Dispatch;
            let outcome = self.dispatch(&intent);
            (outcome, Some(intent))
        };

        self.state = TurnState::Learn;
        let before = self.stores.context.get_current();
        self.stores
            .memory
            .store(text, &outcome.response, outcome.success, before);

        self.state = TurnState::ContextUpdate;
        self.stores.context.update(text);
        if outcome.success {
            if let Some(intent) = &intent {
                self.track_active_app(intent);
            }
        }
        self.stores.history.push(text, &outcome.response);

        if outcome.success {
            self.state = TurnState::CacheWrite;
            self.stores.cache.put(text, &outcome.response);
        }

        tracing::info!(
            text,
            success = outcome.success,
            source = ?outcome.source,
            "turn complete"
        );
        self.state = TurnState::Respond;
        outcome
    }

    fn execute_skill(&self, text: &str) -> TurnOutcome {
        match self.stores.skills.execute(text, &self.dispatcher) {
            Ok(result) => TurnOutcome {
                response: result.message,
                success: true,
                source: ResponseSource::Skill,
            },
            Err(e) => {
                tracing::warn!(error = %e, "skill failed");
                TurnOutcome {
                    response: e.to_string(),
                    success: false,
                    source: ResponseSource::Skill,
                }
            }
        }
    }

    fn dispatch(&self, intent: &Intent) -> TurnOutcome {
        let result = self.dispatcher.dispatch(intent);
        match intent {
            Intent::Conversation { reply } => TurnOutcome {
                success: !reply.contains(FAILURE_MARKER),
                response: result.message,
                source: ResponseSource::Conversation,
            },
            Intent::Command { .. } => TurnOutcome {
                success: result.success,
                response: result.message,
                source: ResponseSource::Dispatch,
            },
        }
    }

    fn track_active_app(&mut self, intent: &Intent) {
        let Intent::Command {
            action: ActionRef::Supported(action),
            parameters,
            ..
        } = intent
        else {
            return;
        };
        let name = parameters.get("name").cloned();
        match action {
            Action::Open => self.stores.context.set_active_app(name),
            Action::Close => {
                let current = self.stores.context.get_current().active_app;
                if name.is_none() || name == current {
                    self.stores.context.set_active_app(None);
                }
            }
            _ => {}
        }
    }

    /// Current context, for status reporting.
    pub fn context(&self) -> ContextSnapshot {
        self.stores.context.get_current()
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = self.output.speak(text) {
            tracing::warn!(error = %e, "speech output failed");
        }
    }

    /// Greet, then run turns until the shutdown flag is raised.
    pub fn run(&mut self) {
        self.say(GREETING);

        while !self.shutdown.load(Ordering::SeqCst) {
            self.state = TurnState::Listening;
            let text = match self.input.listen() {
                Ok(Some(text)) => text,
                Ok(None) => {
                    self.state = TurnState::Idle;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "speech input failed");
                    self.state = TurnState::Idle;
                    continue;
                }
            };

            let outcome = self.handle_text(&text);
            self.say(&outcome.response);
            self.state = TurnState::Idle;
        }

        self.shutdown();
    }

    /// Flush every store and say goodbye.
    pub fn shutdown(&mut self) {
        self.state = TurnState::ShuttingDown;
        tracing::info!("shutting down");
        if let Err(e) = self.stores.flush() {
            tracing::error!(error = %e, "final save failed");
        }
        self.say(FAREWELL);
    }
}

/// Raise `flag` on SIGINT or SIGTERM. A second signal while the flag is
/// already set terminates the process immediately.
pub fn install_signal_handlers(flag: &Arc<AtomicBool>) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(flag))?;
        signal_hook::flag::register(signal, Arc::clone(flag))?;
    }
    Ok(())
}
