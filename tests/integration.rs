//! Integration tests: full turns through the controller with scripted
//! collaborators.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use voxa::config::AssistantConfig;
use voxa::context::{ContextSnapshot, Topic};
use voxa::controller::{ResponseSource, Stores, TurnController};
use voxa::dispatch::{ActionDispatcher, handler_fn};
use voxa::error::{AutomationError, SpeechResult};
use voxa::inference::{InferenceBackend, InferenceError, InferenceResult};
use voxa::intent::{APOLOGY, Action, ActionTemplate, IntentResolver, Parameters};
use voxa::speech::{SpeechInput, SpeechOutput};

/// Backend that replays a fixed answer and counts calls.
struct ScriptedBackend {
    reply: Option<&'static str>,
    calls: Rc<Cell<usize>>,
}

impl InferenceBackend for ScriptedBackend {
    fn process_query(&self, _prompt: &str, _context: &ContextSnapshot) -> InferenceResult<String> {
        self.calls.set(self.calls.get() + 1);
        self.reply
            .map(str::to_string)
            .ok_or(InferenceError::RequestFailed {
                message: "scripted outage".into(),
            })
    }
}

type Invocations = Rc<RefCell<Vec<(Action, Parameters)>>>;

struct Silent;

impl SpeechInput for Silent {
    fn listen(&mut self) -> SpeechResult<Option<String>> {
        Ok(None)
    }
}

impl SpeechOutput for Silent {
    fn speak(&mut self, _text: &str) -> SpeechResult<()> {
        Ok(())
    }
}

struct Harness {
    controller: TurnController,
    calls: Rc<Cell<usize>>,
    invocations: Invocations,
}

fn harness(reply: Option<&'static str>) -> Harness {
    harness_with(reply, Ok(true))
}

fn harness_with(reply: Option<&'static str>, handler_result: Result<bool, ()>) -> Harness {
    let calls = Rc::new(Cell::new(0));
    let invocations: Invocations = Rc::default();
    let log = Rc::clone(&invocations);

    let mut dispatcher = ActionDispatcher::new();
    dispatcher.bind_all(handler_fn(move |action, p| {
        log.borrow_mut().push((action, p.clone()));
        handler_result.map_err(|_| AutomationError::Unsupported {
            action: action.to_string(),
        })
    }));

    let controller = TurnController::new(
        Stores::in_memory(&AssistantConfig::default()),
        IntentResolver::new(Box::new(ScriptedBackend {
            reply,
            calls: Rc::clone(&calls),
        })),
        dispatcher,
        Box::new(Silent),
        Box::new(Silent),
        Arc::new(AtomicBool::new(false)),
    );
    Harness {
        controller,
        calls,
        invocations,
    }
}

#[test]
fn open_command_end_to_end() {
    let mut h = harness(None);
    let outcome = h.controller.handle_text("open chrome");

    assert!(outcome.success);
    assert_eq!(outcome.source, ResponseSource::Dispatch);
    assert_eq!(h.calls.get(), 0);

    let invocations = h.invocations.borrow();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].0, Action::Open);
    assert_eq!(invocations[0].1.get("name").map(String::as_str), Some("chrome"));

    let stores = h.controller.stores();
    assert_eq!(stores.memory.len(), 1);
    assert_eq!(stores.memory.success_rate("open chrome"), 1.0);
    let context = stores.context.get_current();
    assert_eq!(context.recent_commands, vec!["open chrome".to_string()]);
    assert_eq!(context.topic, Some(Topic::System));
    assert_eq!(context.active_app.as_deref(), Some("chrome"));
    assert_eq!(stores.cache.lookup("open chrome"), Some(outcome.response.as_str()));
}

#[test]
fn repeated_command_is_served_from_cache() {
    let mut h = harness(None);
    let first = h.controller.handle_text("open chrome");
    assert_eq!(first.source, ResponseSource::Dispatch);

    let second = h.controller.handle_text("open chrome");
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.response, first.response);
    assert!(second.success);

    assert_eq!(h.calls.get(), 0);
    assert_eq!(h.invocations.borrow().len(), 1);
    assert_eq!(h.controller.stores().memory.len(), 1);
}

#[test]
fn near_duplicate_hits_cache_without_side_effects() {
    let mut h = harness(Some(r#"{"kind": "conversation", "reply": "It is 42."}"#));
    let first = h.controller.handle_text("what is the answer to everything");
    assert!(first.success);
    assert_eq!(h.calls.get(), 1);

    let second = h.controller.handle_text("what is the answer to everythin");
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.response, "It is 42.");
    assert_eq!(h.calls.get(), 1, "cache hit must not reach the backend");

    let stores = h.controller.stores();
    assert_eq!(stores.memory.len(), 1);
    assert_eq!(stores.context.get_current().recent_commands.len(), 1);
    assert_eq!(stores.history.len(), 1);
}

#[test]
fn greeting_never_reaches_backend() {
    let mut h = harness(Some("{}"));
    let outcome = h.controller.handle_text("Hi");
    assert!(outcome.success);
    assert_eq!(outcome.response, "Hi there!");
    assert_eq!(h.calls.get(), 0);
}

#[test]
fn backend_outage_apologises_and_is_not_cached() {
    let mut h = harness(None);
    let outcome = h.controller.handle_text("asdkjasd nonsense");
    assert!(!outcome.success);
    assert_eq!(outcome.response, APOLOGY);

    let stores = h.controller.stores();
    assert!(stores.cache.is_empty());
    assert_eq!(stores.memory.stats("asdkjasd nonsense").map(|s| s.successful), Some(0));
}

#[test]
fn unknown_action_fails_without_invoking_automation() {
    let mut h = harness(Some(
        r#"{"kind": "command", "action": "teleport", "parameters": {"to": "mars"}, "reply": "Beaming."}"#,
    ));
    let outcome = h.controller.handle_text("beam me to mars");
    assert!(!outcome.success);
    assert!(outcome.response.contains("unrecognized action"));
    assert!(h.invocations.borrow().is_empty());
    assert!(h.controller.stores().cache.is_empty());
}

#[test]
fn failing_handler_is_recorded_as_failure() {
    let mut h = harness_with(
        Some(r#"{"kind": "command", "action": "search", "parameters": {"query": "weather"}}"#),
        Err(()),
    );
    let outcome = h.controller.handle_text("search the weather");
    assert!(!outcome.success);
    assert_eq!(h.controller.stores().memory.success_rate("search the weather"), 0.0);
}

#[test]
fn builtin_skill_shadows_learned_and_inference() {
    let mut h = harness(Some(r#"{"kind": "command", "action": "open", "parameters": {"name": "vlc"}}"#));
    h.controller
        .stores_mut()
        .skills
        .learn(
            "music",
            &["play".to_string()],
            ActionTemplate::new(Action::Open).with_param("name", "spotify"),
        )
        .unwrap();

    let outcome = h.controller.handle_text("play some jazz");
    assert!(outcome.success);
    assert_eq!(outcome.source, ResponseSource::Skill);
    assert_eq!(h.calls.get(), 0);
    assert_eq!(h.invocations.borrow()[0].0, Action::Media);
}

#[test]
fn learned_skill_runs_its_template() {
    let mut h = harness(None);
    h.controller
        .stores_mut()
        .skills
        .learn(
            "news",
            &["headlines".to_string()],
            ActionTemplate::new(Action::Browser)
                .with_param("url", "https://news.ycombinator.com")
                .with_reply("Opening the headlines."),
        )
        .unwrap();

    let outcome = h.controller.handle_text("show me the headlines");
    assert_eq!(outcome.response, "Opening the headlines.");
    assert_eq!(outcome.source, ResponseSource::Skill);
    assert_eq!(h.calls.get(), 0);
}

#[test]
fn history_feeds_later_prompts() {
    let mut h = harness(Some(r#"{"reply": "Sure."}"#));
    for text in ["tell me a joke", "another one please", "why is the sky blue", "what time is it"] {
        h.controller.handle_text(text);
    }
    let history = h.controller.stores().history.last(3);
    let users: Vec<&str> = history.iter().map(|t| t.user.as_str()).collect();
    assert_eq!(users, vec!["another one please", "why is the sky blue", "what time is it"]);
}
