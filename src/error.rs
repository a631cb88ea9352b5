//! Rich diagnostic error types for voxa.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong
//! and how to fix it. Most of these never escape a turn: the controller logs
//! them and keeps the assistant running.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for voxa.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain through to the CLI.
#[derive(Debug, Error, Diagnostic)]
pub enum VoxaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Skill(#[from] SkillError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Automation(#[from] AutomationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dispatch(#[from] crate::dispatch::DispatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Inference(#[from] crate::inference::InferenceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] crate::paths::PathError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(voxa::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error for {path}: {message}")]
    #[diagnostic(
        code(voxa::store::serde),
        help(
            "Failed to serialize or deserialize a state document. \
             Delete the file to start from empty state; it is rebuilt on the next save."
        )
    )]
    Serialization { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Skill errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SkillError {
    #[error("no skill matches \"{command}\"")]
    #[diagnostic(
        code(voxa::skill::no_match),
        help("Check `voxa skill list` for trigger patterns, or teach one with `voxa skill learn`.")
    )]
    NoMatch { command: String },

    #[error("skill \"{skill}\" does not understand \"{command}\"")]
    #[diagnostic(
        code(voxa::skill::unhandled),
        help("The command matched a trigger pattern but none of the skill's operations.")
    )]
    Unhandled { skill: String, command: String },

    #[error("skill \"{skill}\" failed: {message}")]
    #[diagnostic(
        code(voxa::skill::execution),
        help("The automation backend reported a failure while running the skill's action.")
    )]
    Execution { skill: String, message: String },

    #[error("learned skill not found: \"{name}\"")]
    #[diagnostic(
        code(voxa::skill::not_found),
        help("List learned skills with `voxa skill list`.")
    )]
    NotFound { name: String },

    #[error("invalid skill definition \"{name}\": {message}")]
    #[diagnostic(
        code(voxa::skill::invalid),
        help("A skill needs a name, at least one non-empty trigger pattern, and a supported action.")
    )]
    Invalid { name: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

pub type SkillResult<T> = std::result::Result<T, SkillError>;

// ---------------------------------------------------------------------------
// Speech errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SpeechError {
    #[error("speech input failed: {message}")]
    #[diagnostic(
        code(voxa::speech::input),
        help("The listener could not produce an utterance. Check the input device or stream.")
    )]
    Input { message: String },

    #[error("speech output failed: {message}")]
    #[diagnostic(
        code(voxa::speech::output),
        help("Check that the configured speech command exists and is executable.")
    )]
    Output { message: String },
}

pub type SpeechResult<T> = std::result::Result<T, SpeechError>;

// ---------------------------------------------------------------------------
// Automation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AutomationError {
    #[error("missing parameter \"{name}\" for action {action}")]
    #[diagnostic(
        code(voxa::automation::missing_param),
        help("The intent did not carry every parameter this action needs.")
    )]
    MissingParameter { action: String, name: String },

    #[error("action {action} is not supported by this automation backend")]
    #[diagnostic(
        code(voxa::automation::unsupported),
        help("Bind a different handler for this action or enable dry-run mode.")
    )]
    Unsupported { action: String },

    #[error("failed to launch \"{program}\": {source}")]
    #[diagnostic(
        code(voxa::automation::launch),
        help("Check that the platform opener (xdg-open, open, or start) is installed.")
    )]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type AutomationResult<T> = std::result::Result<T, AutomationError>;

/// Convenience alias for functions returning voxa results.
pub type VoxaResult<T> = std::result::Result<T, VoxaError>;
