//! Action dispatcher: maps intents to bound automation handlers.
//!
//! Handlers are registered per [`Action`]; [`ActionDispatcher::dispatch`]
//! never fails, every problem is folded into an unsuccessful
//! [`ActionResult`].

use std::collections::HashMap;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::error::AutomationError;
use crate::intent::{Action, ActionRef, Intent, Parameters};

/// Reasons a command intent could not be carried out.
#[derive(Debug, Error, Diagnostic)]
pub enum DispatchError {
    #[error("unrecognized action: {name}")]
    #[diagnostic(
        code(voxa::dispatch::unrecognized_action),
        help("Supported actions: open, close, search, type, click, scroll, system, browser, file, folder, media, window.")
    )]
    UnrecognizedAction { name: String },

    #[error("no handler bound for action {action}")]
    #[diagnostic(
        code(voxa::dispatch::no_handler),
        help("Bind an automation backend with `ActionDispatcher::bind_all`.")
    )]
    NoHandler { action: Action },

    #[error("action {action} did not complete")]
    #[diagnostic(code(voxa::dispatch::declined))]
    Declined { action: Action },

    #[error("action {action} failed: {source}")]
    #[diagnostic(code(voxa::dispatch::handler_failed))]
    HandlerFailed {
        action: Action,
        #[source]
        source: AutomationError,
    },
}

/// Something that can perform an action on the desktop.
pub trait ActionHandler {
    /// Perform `action`. `Ok(false)` means the handler ran but the effect
    /// did not happen.
    fn invoke(&self, action: Action, parameters: &Parameters) -> Result<bool, AutomationError>;
}

impl<F> ActionHandler for F
where
    F: Fn(Action, &Parameters) -> Result<bool, AutomationError>,
{
    fn invoke(&self, action: Action, parameters: &Parameters) -> Result<bool, AutomationError> {
        self(action, parameters)
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(Action, &Parameters) -> Result<bool, AutomationError> + 'static,
{
    Arc::new(f)
}

/// Outcome of dispatching an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ActionResult {
    fn from(e: DispatchError) -> Self {
        Self::err(e.to_string())
    }
}

/// Registry of action handlers.
#[derive(Default)]
pub struct ActionDispatcher {
    handlers: HashMap<Action, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to one action, replacing any previous binding.
    pub fn register(&mut self, action: Action, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action, handler);
    }

    /// Bind the same handler to every supported action.
    pub fn bind_all(&mut self, handler: Arc<dyn ActionHandler>) {
        for action in Action::ALL {
            self.handlers.insert(action, Arc::clone(&handler));
        }
    }

    pub fn is_bound(&self, action: Action) -> bool {
        self.handlers.contains_key(&action)
    }

    pub fn dispatch(&self, intent: &Intent) -> ActionResult {
        match intent {
            Intent::Conversation { reply } => ActionResult::ok(reply.clone()),
            Intent::Command {
                action,
                parameters,
                reply,
            } => match self.run(action, parameters) {
                Ok(()) => {
                    tracing::info!(%action, "action executed");
                    let message = if reply.is_empty() {
                        format!("Done: {action}.")
                    } else {
                        reply.clone()
                    };
                    ActionResult::ok(message)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "dispatch failed");
                    e.into()
                }
            },
        }
    }

    fn run(&self, action: &ActionRef, parameters: &Parameters) -> Result<(), DispatchError> {
        let action = match action {
            ActionRef::Supported(action) => *action,
            ActionRef::Unrecognized(name) => {
                return Err(DispatchError::UnrecognizedAction { name: name.clone() });
            }
        };
        let handler = self
            .handlers
            .get(&action)
            .ok_or(DispatchError::NoHandler { action })?;

        match handler.invoke(action, parameters) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DispatchError::Declined { action }),
            Err(source) => Err(DispatchError::HandlerFailed { action, source }),
        }
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bound: Vec<Action> = self.handlers.keys().copied().collect();
        bound.sort();
        f.debug_struct("ActionDispatcher")
            .field("bound", &bound)
            .finish()
    }
}
