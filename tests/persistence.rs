//! Persistence and recovery tests for the voxa stores.
//!
//! Each test writes state in one "session", reopens the store from the same
//! data directory, and checks what survived. Timestamps are left out of
//! comparisons.

use std::io::{BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use voxa::automation::DryRunAutomation;
use voxa::config::AssistantConfig;
use voxa::context::{ContextSnapshot, ContextTracker, IntentClass, Topic};
use voxa::controller::{Stores, TurnController};
use voxa::dispatch::ActionDispatcher;
use voxa::error::{SpeechResult, StoreError, VoxaError};
use voxa::inference::OfflineBackend;
use voxa::intent::IntentResolver;
use voxa::history::CommandHistory;
use voxa::intent::{Action, ActionTemplate};
use voxa::memory::{InteractionMemory, SAVE_EVERY};
use voxa::paths::VoxaPaths;
use voxa::skills::{SkillStore, SkillTier};
use voxa::speech::{ConsoleListener, SpeechOutput};

#[test]
fn context_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());

    {
        let mut context = ContextTracker::open(paths.context_file());
        context.update("open notepad");
        context.update("what is the weather");
        context.set_active_app(Some("notepad".into()));
        context.update_system_state([("volume", "40")]);
    }

    let context = ContextTracker::open(paths.context_file());
    let current = context.get_current();
    assert_eq!(
        current.recent_commands,
        vec!["open notepad".to_string(), "what is the weather".to_string()]
    );
    assert_eq!(current.topic, Some(Topic::System));
    assert_eq!(current.intent_class, Some(IntentClass::Query));
    assert_eq!(current.active_app.as_deref(), Some("notepad"));
    assert_eq!(current.system_state.get("volume").map(String::as_str), Some("40"));
    assert_eq!(context.history().len(), 2);
}

#[test]
fn memory_saves_on_every_tenth_record() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());

    {
        let mut memory = InteractionMemory::open(paths.memory_file(), 1000);
        for i in 0..SAVE_EVERY + 3 {
            memory.store(&format!("command {i}"), "ok", i % 2 == 0, ContextSnapshot::default());
        }
        // No flush: only the periodic save at record 10 reached disk.
    }

    let memory = InteractionMemory::open(paths.memory_file(), 1000);
    assert_eq!(memory.len(), SAVE_EVERY as usize);
    assert_eq!(memory.success_rate("command 0"), 1.0);
    assert_eq!(memory.success_rate("command 1"), 0.0);
    assert!(memory.stats("command 11").is_none());
}

#[test]
fn memory_tenth_record_reaches_disk_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());

    let commands: Vec<String> = (0..SAVE_EVERY).map(|i| format!("command {i}")).collect();
    {
        let mut memory = InteractionMemory::open(paths.memory_file(), 1000);
        for command in &commands {
            memory.store(command, "ok", true, ContextSnapshot::default());
        }
    }

    let memory = InteractionMemory::open(paths.memory_file(), 1000);
    let reloaded: Vec<String> = memory.records().map(|r| r.command.clone()).collect();
    assert_eq!(reloaded, commands);
}

#[test]
fn memory_flush_keeps_everything() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());

    let originals: Vec<(String, bool)> = {
        let mut memory = InteractionMemory::open(paths.memory_file(), 1000);
        memory.store("open chrome", "Opening chrome.", true, ContextSnapshot::default());
        memory.store("open chrome", "failed", false, ContextSnapshot::default());
        memory.store("play music", "Toggled play/pause.", true, ContextSnapshot::default());
        memory.flush().unwrap();
        memory.records().map(|r| (r.command.clone(), r.success)).collect()
    };

    let memory = InteractionMemory::open(paths.memory_file(), 1000);
    let reloaded: Vec<(String, bool)> = memory.records().map(|r| (r.command.clone(), r.success)).collect();
    assert_eq!(reloaded, originals);
    assert!((memory.success_rate("open chrome") - 0.5).abs() < 1e-12);
    assert_eq!(memory.appended(), 3);
}

#[test]
fn learned_skills_reload_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());

    {
        let mut skills = SkillStore::open(paths.skills_file());
        skills
            .learn(
                "news",
                &["headlines".to_string()],
                ActionTemplate::new(Action::Browser).with_param("url", "https://lwn.net"),
            )
            .unwrap();
        skills
            .learn(
                "editor",
                &["start coding".to_string(), "open editor".to_string()],
                ActionTemplate::new(Action::Open).with_param("name", "code"),
            )
            .unwrap();
        skills
            .learn(
                "news",
                &["news".to_string()],
                ActionTemplate::new(Action::Browser).with_param("url", "https://news.ycombinator.com"),
            )
            .unwrap();
    }

    let skills = SkillStore::open(paths.skills_file());
    let names: Vec<&str> = skills.learned().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["news", "editor"]);
    assert_eq!(
        skills.learned()[0].template.parameters.get("url").map(String::as_str),
        Some("https://news.ycombinator.com")
    );
    let found = skills.find("please start coding").unwrap();
    assert_eq!(found.name, "editor");
    assert_eq!(found.tier, SkillTier::Learned);
}

#[test]
fn command_history_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());

    {
        let mut history = CommandHistory::open(paths.history_file(), 3);
        for i in 0..5 {
            history.push(&format!("q{i}"), &format!("a{i}"));
        }
    }

    let history = CommandHistory::open(paths.history_file(), 3);
    let turns: Vec<(&str, &str)> = history
        .last(10)
        .into_iter()
        .map(|t| (t.user.as_str(), t.assistant.as_str()))
        .collect();
    assert_eq!(turns, vec![("q2", "a2"), ("q3", "a3"), ("q4", "a4")]);
}

#[test]
fn corrupt_documents_fall_back_to_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());
    for file in [
        paths.context_file(),
        paths.memory_file(),
        paths.skills_file(),
        paths.history_file(),
    ] {
        std::fs::write(file, "{ not json").unwrap();
    }

    let stores = Stores::open(&paths, &AssistantConfig::default());
    assert!(stores.memory.is_empty());
    assert!(stores.skills.learned().is_empty());
    assert!(stores.history.is_empty());
    assert!(stores.context.get_current().recent_commands.is_empty());

    // The next save replaces the corrupt file with a valid document.
    stores.flush().unwrap();
    let reopened = Stores::open(&paths, &AssistantConfig::default());
    assert!(reopened.memory.is_empty());
}

#[test]
fn missing_data_dir_is_created_on_save() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path().join("not").join("yet"));

    let mut history = CommandHistory::open(paths.history_file(), 10);
    history.push("hello", "Hello! How can I help?");

    assert!(paths.history_file().exists());
}

#[test]
fn flush_reports_unwritable_data_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut stores = Stores::open(&VoxaPaths::rooted(&blocker), &AssistantConfig::default());
    stores.memory.store("open chrome", "ok", true, ContextSnapshot::default());

    let err = stores.flush().unwrap_err();
    assert!(matches!(err, VoxaError::Store(StoreError::Io { .. })));
}

/// Input that never arrives, like a terminal nobody types into.
struct Idle;

impl Read for Idle {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            std::thread::park();
        }
    }
}

struct Mute;

impl SpeechOutput for Mute {
    fn speak(&mut self, _text: &str) -> SpeechResult<()> {
        Ok(())
    }
}

#[test]
fn shutdown_while_waiting_for_input_saves_state() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = VoxaPaths::rooted(dir.path());
    let config = AssistantConfig::default();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut dispatcher = ActionDispatcher::new();
    dispatcher.bind_all(Arc::new(DryRunAutomation));
    let input = ConsoleListener::new(BufReader::new(Idle), Arc::clone(&shutdown)).unwrap();
    let mut controller = TurnController::new(
        Stores::open(&paths, &config),
        IntentResolver::new(Box::new(OfflineBackend)),
        dispatcher,
        Box::new(input),
        Box::new(Mute),
        Arc::clone(&shutdown),
    );

    for text in ["open chrome", "pause the music", "open notepad"] {
        controller.handle_text(text);
    }
    assert!(!paths.memory_file().exists());

    let signal = {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            shutdown.store(true, Ordering::SeqCst);
        })
    };
    controller.run();
    signal.join().unwrap();

    let memory = InteractionMemory::open(paths.memory_file(), 1000);
    let commands: Vec<&str> = memory.records().map(|r| r.command.as_str()).collect();
    assert_eq!(commands, vec!["open chrome", "pause the music", "open notepad"]);
}
