//! DrBot binary.
//!
//! Loads configuration, registers the bundled Botlings and runs the main loop
//! until Ctrl-C. The forum HTTP client is supplied by hosts embedding the
//! library; this binary runs against the in-memory forum.

use clap::Parser;
use drbot::{DrBot, DrbotConfig, ShutdownHandle, default_botlings, init_logging};
use drbot_botling::Dispatcher;
use drbot_interface::{ForumClient, MemoryForum, ThrottledForum};
use drbot_storage::{CheckpointStore, DocumentCheckpointStore, JsonFileCheckpointStore, StorageAdapter};
use std::sync::Arc;
use tracing::{error, info};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = DrbotConfig::load_from(cli.config.as_deref())?;
    if cli.dry_run {
        config = config.with_dry_run(true);
    }
    let mut logging = config.logging().clone();
    if cli.verbose {
        logging = logging.with_level("debug".to_string());
    }
    if cli.json_logs {
        logging = logging.with_json(true);
    }
    init_logging(&logging)?;

    let forum: Arc<dyn ForumClient> = Arc::new(ThrottledForum::new(
        MemoryForum::new(config.account().clone()),
        *config.requests_per_minute(),
    ));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check(&config, forum),
        Commands::Run => run(&config, forum).await,
    }
}

fn check(config: &DrbotConfig, forum: Arc<dyn ForumClient>) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(StorageAdapter::new(Arc::clone(&forum), config.storage().clone()));
    let dispatcher = Dispatcher::new(storage, forum, Arc::new(config.host_settings()), true);

    let mut invalid = 0;
    for botling in default_botlings() {
        match dispatcher.validate(botling.as_ref()) {
            Ok(_) => info!(botling = %botling.name(), "Settings valid"),
            Err(e) => {
                error!(botling = %botling.name(), error = %e, "Settings invalid");
                invalid += 1;
            }
        }
    }
    if invalid > 0 {
        return Err(format!("{} Botling(s) have invalid settings", invalid).into());
    }
    info!("Configuration valid");
    Ok(())
}

async fn run(config: &DrbotConfig, forum: Arc<dyn ForumClient>) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoints: Arc<dyn CheckpointStore> = match config.checkpoint_file() {
        Some(path) => Arc::new(JsonFileCheckpointStore::new(path.clone())),
        None => Arc::new(DocumentCheckpointStore::new(
            Arc::clone(&forum),
            config.storage().prefix().clone(),
            *config.dry_run(),
        )),
    };

    let mut bot = DrBot::start(forum, checkpoints, config, default_botlings()).await?;

    let shutdown = ShutdownHandle::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping gracefully..."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C; stopping"),
        }
        trigger.shutdown();
    });

    bot.run(shutdown).await?;
    Ok(())
}
