// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # voxa
//!
//! The decision core of a desktop voice assistant: turns an utterance into
//! a reply, and an action when one was asked for, while learning from every
//! turn.
//!
//! ## Architecture
//!
//! - **Turn controller** (`controller`): cache → skills → intent resolution → dispatch
//! - **Intent resolution** (`intent`, `inference`): canned replies, shortcuts, then an LLM
//! - **Dispatch** (`dispatch`, `automation`): closed action set bound to automation handlers
//! - **Adaptive state** (`context`, `memory`, `skills`, `history`, `cache`): JSON-persisted stores
//! - **Similarity** (`similarity`): the fuzzy "same command" test shared by the stores
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use voxa::automation::DryRunAutomation;
//! use voxa::config::AssistantConfig;
//! use voxa::controller::{Stores, TurnController};
//! use voxa::dispatch::ActionDispatcher;
//! use voxa::inference::OfflineBackend;
//! use voxa::intent::IntentResolver;
//! use voxa::speech::{ConsoleListener, ConsoleSpeaker};
//!
//! # fn main() -> voxa::error::VoxaResult<()> {
//! let config = AssistantConfig::default();
//! let shutdown = Arc::new(AtomicBool::new(false));
//! let mut dispatcher = ActionDispatcher::new();
//! dispatcher.bind_all(Arc::new(DryRunAutomation));
//!
//! let mut controller = TurnController::new(
//!     Stores::in_memory(&config),
//!     IntentResolver::new(Box::new(OfflineBackend)),
//!     dispatcher,
//!     Box::new(ConsoleListener::stdin(Arc::clone(&shutdown))?),
//!     Box::new(ConsoleSpeaker),
//!     shutdown,
//! );
//! let outcome = controller.handle_text("open firefox");
//! assert!(outcome.success);
//! controller.stores().flush()?;
//! # Ok(())
//! # }
//! ```

pub mod automation;
pub mod cache;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod inference;
pub mod intent;
pub mod memory;
pub mod paths;
pub mod persist;
pub mod similarity;
pub mod skills;
pub mod speech;
