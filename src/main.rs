//! Persona Engine - persona routing and sequential conversation execution
//!
//! This is the main entry point for the persona-engine binary. It wires the
//! library's orchestrator to the bundled persona catalog, the in-memory
//! conversation store, and the mock model backend for local use.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use persona_engine::backend::{InMemoryStore, MockModelBackend};
use persona_engine::cli::{Cli, Commands, ConfigSubcommand, PersonaSubcommand};
use persona_engine::config::{init_config, EngineConfig};
use persona_engine::error::{Error, Result};
use persona_engine::logging::{self, LogGuards};
use persona_engine::metrics::NoopMetrics;
use persona_engine::persona::{PersonaCatalog, PersonaKind, PersonaRouter};
use persona_engine::types::Message;
use persona_engine::{version, Orchestrator};

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // For commands that don't need full logging, use simple setup
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        Commands::Persona { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_persona_command(subcommand.clone());
        }
        Commands::Route {
            message,
            config,
            json,
        } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_route_command(message, config.as_deref(), *json);
        }
        Commands::Chat { .. } => {}
    }

    let Commands::Chat {
        config: config_path,
        conversation,
        sender,
    } = cli.command
    else {
        unreachable!();
    };

    // Load config (or use defaults)
    let config = match EngineConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging with config settings
    // The guards must be kept alive for the lifetime of the program
    let _log_guards: LogGuards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    // Log version info at startup
    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting persona engine"
    );

    // Build and run the tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.worker_count().min(8))
        .thread_name("persona-engine")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(run_chat(config, conversation, sender))
}

/// Load the persona catalog honoring an override directory if configured.
fn load_catalog(config: &EngineConfig) -> Result<PersonaCatalog> {
    match config.persona_dir() {
        Some(dir) => PersonaCatalog::load_dir(dir, config.default_persona()),
        None => PersonaCatalog::load_bundled(config.default_persona()),
    }
}

/// Interactive chat loop against the mock backend.
async fn run_chat(config: EngineConfig, conversation: String, sender: String) -> Result<()> {
    let catalog = Arc::new(load_catalog(&config)?);
    let backend = Arc::new(MockModelBackend::new());
    let store = Arc::new(InMemoryStore::new(config.orchestrator.context_window));
    let metrics = Arc::new(NoopMetrics);

    let orchestrator = Orchestrator::new(&config, catalog, backend, store, metrics);
    orchestrator.start();

    info!(conversation = %conversation, "chat session started");
    println!("persona-engine chat (conversation '{}'), empty line or Ctrl-D to quit", conversation);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(Error::Io)?;
        let line = line.trim();
        if read == 0 || line.is_empty() {
            break;
        }

        let message = Message::new(conversation.clone(), sender.clone(), line);
        match orchestrator.submit(message).await {
            Ok(handle) => match handle.wait().await {
                Ok(result) => {
                    println!(
                        "[{} | confidence {:.2} | {} attempt(s)]",
                        result.persona_id, result.confidence, result.attempts
                    );
                    println!("{}", result.text);
                }
                Err(e) => eprintln!("task failed: {}", e),
            },
            Err(e) => eprintln!("rejected: {}", e),
        }
    }

    orchestrator.shutdown().await;
    println!("bye");
    Ok(())
}

/// Route one message and print the decision.
fn handle_route_command(message: &str, config_path: Option<&str>, json: bool) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    let catalog = load_catalog(&config)?;
    let router = PersonaRouter::new(config.router.clone());

    let msg = Message::new("route-preview", "cli", message);
    let decision = router.route(&msg, &catalog.snapshot());

    if json {
        let payload = serde_json::json!({
            "persona": decision.persona.id(),
            "score": decision.score,
            "fallback": decision.fallback,
            "catalog_version": decision.catalog_version,
        });
        println!("{}", serde_json::to_string_pretty(&payload).map_err(|e| Error::Internal(e.to_string()))?);
    } else {
        println!(
            "persona: {}  score: {:.4}  fallback: {}",
            decision.persona.id(),
            decision.score,
            decision.fallback
        );
    }
    Ok(())
}

/// Handle persona catalog subcommands
fn handle_persona_command(subcommand: PersonaSubcommand) -> Result<()> {
    match subcommand {
        PersonaSubcommand::List { config } => {
            let config = EngineConfig::load(config.as_deref())?;
            let catalog = load_catalog(&config)?;
            let snapshot = catalog.snapshot();
            println!("{:<12} {:<9} {:<8} DESCRIPTION", "PERSONA", "VERSION", "RULES");
            for persona in snapshot.all() {
                let marker = if persona.kind == snapshot.default_kind() {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{:<12} {:<9} {:<8} {}{}",
                    persona.id(),
                    persona.version,
                    persona.rules.len(),
                    persona.description,
                    marker
                );
            }
            Ok(())
        }
        PersonaSubcommand::Show { persona, config } => {
            let kind: PersonaKind = persona.parse().map_err(Error::Config)?;
            let config = EngineConfig::load(config.as_deref())?;
            let catalog = load_catalog(&config)?;
            let persona = catalog.snapshot().resolve(kind)?;
            let toml = toml::to_string_pretty(persona.as_ref())?;
            print!("{}", toml);
            Ok(())
        }
    }
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let config = EngineConfig::load(config.as_deref())?;
            let toml = toml::to_string_pretty(&config)?;
            print!("{}", toml);
            Ok(())
        }
        ConfigSubcommand::Init { path, force } => init_config(path.as_deref(), force),
        ConfigSubcommand::Validate { config } => {
            match EngineConfig::load(config.as_deref()) {
                Ok(_) => {
                    println!("Configuration is valid");
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Configuration is invalid: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
