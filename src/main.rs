//! voxa CLI: desktop voice assistant core.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use voxa::automation::{DesktopAutomation, DryRunAutomation};
use voxa::config::AssistantConfig;
use voxa::controller::{Stores, TurnController, install_signal_handlers};
use voxa::dispatch::ActionDispatcher;
use voxa::error::VoxaResult;
use voxa::inference::{InferenceBackend, OfflineBackend, OllamaBackend};
use voxa::intent::{Action, ActionTemplate, IntentResolver};
use voxa::paths::VoxaPaths;
use voxa::speech::{ConsoleListener, speaker_for};

#[derive(Parser)]
#[command(name = "voxa", version, about = "Desktop voice assistant core")]
struct Cli {
    /// Directory holding the persisted state documents.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/voxa/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and a default config file.
    Init,

    /// Run the assistant, one utterance per line on stdin.
    Run,

    /// Handle a single utterance and print the reply.
    Ask {
        /// The utterance.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show interaction statistics.
    Stats,

    /// Manage skills.
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Inspect or reset the conversation context.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// List built-in and learned skills.
    List,

    /// Teach a skill.
    Learn {
        /// Skill name; an existing skill with this name is replaced.
        #[arg(long)]
        name: String,

        /// Trigger pattern (repeatable).
        #[arg(long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Action to run (open, search, browser, ...).
        #[arg(long)]
        action: String,

        /// Action parameter as key=value (repeatable).
        #[arg(long = "param")]
        params: Vec<String>,

        /// What to say when the skill runs.
        #[arg(long)]
        reply: Option<String>,
    },

    /// Remove a learned skill.
    Forget {
        /// Skill name.
        name: String,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// Print the current context.
    Show,
    /// Reset the context and its history.
    Clear,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut paths = VoxaPaths::resolve()?;
    if let Some(data_dir) = &cli.data_dir {
        paths = paths.with_data_dir(data_dir);
    }
    let config_file = cli.config.clone().unwrap_or_else(|| paths.config_file());

    let load_config = || AssistantConfig::load_or_default(&config_file);

    match cli.command {
        Commands::Init => {
            paths.ensure_dirs()?;
            if config_file.exists() {
                println!("Config already exists: {}", config_file.display());
            } else {
                AssistantConfig::default().save(&config_file)?;
                println!("Wrote default config: {}", config_file.display());
            }
            println!("Data directory: {}", paths.data_dir.display());
        }

        Commands::Run => {
            let config = load_config()?;
            paths.ensure_dirs()?;
            let shutdown = Arc::new(AtomicBool::new(false));
            install_signal_handlers(&shutdown).into_diagnostic()?;
            let mut controller = build_controller(&paths, &config, Arc::clone(&shutdown))?;
            controller.run();
        }

        Commands::Ask { text } => {
            let config = load_config()?;
            paths.ensure_dirs()?;
            let shutdown = Arc::new(AtomicBool::new(false));
            let mut controller = build_controller(&paths, &config, shutdown)?;
            let outcome = controller.handle_text(&text.join(" "));
            println!("{}", outcome.response);
            controller.stores().flush()?;
            if !outcome.success {
                std::process::exit(1);
            }
        }

        Commands::Stats => {
            let config = load_config()?;
            let stores = Stores::open(&paths, &config);
            let analysis = stores.memory.analyze();
            println!("Interactions: {}", analysis.total);
            println!("Success rate: {:.1}%", analysis.overall_success_rate * 100.0);
            println!("History turns: {}", stores.history.len());
            println!("Learned skills: {}", stores.skills.learned().len());
            if !analysis.common_patterns.is_empty() {
                println!("\nMost common commands:");
                for (command, count) in &analysis.common_patterns {
                    let rate = stores.memory.success_rate(command) * 100.0;
                    println!("  {count:>4}  {rate:>5.1}%  {command}");
                }
            }
            if !analysis.successful_patterns.is_empty() {
                println!("\nMost successful commands:");
                for (command, count) in &analysis.successful_patterns {
                    println!("  {count:>4}  {command}");
                }
            }
        }

        Commands::Skill { action } => {
            let config = load_config()?;
            let mut stores = Stores::open(&paths, &config);
            match action {
                SkillAction::List => {
                    for skill in stores.skills.list() {
                        let action = skill
                            .action
                            .map(|a| format!(" -> {a}"))
                            .unwrap_or_default();
                        println!(
                            "{:<20} [{}] {}{action}",
                            skill.name,
                            skill.tier,
                            skill.patterns.join(", ")
                        );
                    }
                }
                SkillAction::Learn {
                    name,
                    patterns,
                    action,
                    params,
                    reply,
                } => {
                    let action: Action = action.parse().map_err(|raw: String| {
                        miette::miette!(
                            help = "Supported actions: open, close, search, type, click, scroll, system, browser, file, folder, media, window.",
                            "unknown action: {raw}"
                        )
                    })?;
                    let mut template = ActionTemplate::new(action);
                    for param in &params {
                        let (key, value) = param.split_once('=').ok_or_else(|| {
                            miette::miette!("parameter must be key=value: {param}")
                        })?;
                        template = template.with_param(key.trim(), value.trim());
                    }
                    if let Some(reply) = reply {
                        template = template.with_reply(reply);
                    }
                    stores.skills.learn(&name, &patterns, template)?;
                    println!("Learned skill \"{name}\".");
                }
                SkillAction::Forget { name } => {
                    stores.skills.forget(&name)?;
                    println!("Forgot skill \"{name}\".");
                }
            }
        }

        Commands::Context { action } => {
            let config = load_config()?;
            let mut stores = Stores::open(&paths, &config);
            match action {
                ContextAction::Show => {
                    let snapshot = stores.context.get_current();
                    let json = serde_json::to_string_pretty(&snapshot).into_diagnostic()?;
                    println!("{json}");
                    println!("History snapshots: {}", stores.context.history().len());
                }
                ContextAction::Clear => {
                    stores.context.clear();
                    stores.context.flush()?;
                    println!("Context cleared.");
                }
            }
        }
    }

    Ok(())
}

fn build_controller(
    paths: &VoxaPaths,
    config: &AssistantConfig,
    shutdown: Arc<AtomicBool>,
) -> VoxaResult<TurnController> {
    let backend: Box<dyn InferenceBackend> = if config.inference.enabled {
        let ollama = OllamaBackend::new(config.inference.ollama_config());
        if !ollama.probe() {
            tracing::warn!(
                url = %config.inference.base_url,
                "Ollama is not reachable; only canned replies, shortcuts and skills will work"
            );
        }
        Box::new(ollama)
    } else {
        Box::new(OfflineBackend)
    };

    let mut dispatcher = ActionDispatcher::new();
    if config.automation.dry_run {
        dispatcher.bind_all(Arc::new(DryRunAutomation));
    } else {
        dispatcher.bind_all(Arc::new(DesktopAutomation));
    }

    let input = ConsoleListener::stdin(Arc::clone(&shutdown))?;
    Ok(TurnController::new(
        Stores::open(paths, config),
        IntentResolver::new(backend),
        dispatcher,
        Box::new(input),
        speaker_for(config.speech.say_command.as_deref()),
        shutdown,
    ))
}
