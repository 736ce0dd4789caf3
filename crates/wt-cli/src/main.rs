use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{mqtt, report, status, update};
use wt_cli::logind::LogindIdleSource;
use wt_cli::{Cli, Commands, Config, MqttCommand};

/// Load and validate configuration.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    config
        .tracking
        .validate()
        .context("invalid [tracking] configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Open the database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<wt_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    wt_db::Database::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Update) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            update::run(&mut db, &LogindIdleSource::new(), &config.tracking)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            status::run(
                &mut std::io::stdout(),
                &mut db,
                &LogindIdleSource::new(),
                &config.tracking,
                &config.database_path,
            )?;
        }
        Some(Commands::Report { days }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            report::run(&mut std::io::stdout(), &db, *days)?;
        }
        Some(Commands::Mqtt { command }) => match command {
            MqttCommand::Start => {
                let config = load_config(cli.config.as_deref())?;
                let broker = mqtt::require_mqtt(&config)?;
                let db = open_database(&config)?;
                mqtt::start(db, &config.tracking, broker)?;
            }
            MqttCommand::Publish => {
                let config = load_config(cli.config.as_deref())?;
                let broker = mqtt::require_mqtt(&config)?;
                let db = open_database(&config)?;
                mqtt::publish_once(&mut std::io::stdout(), db, &config.tracking, broker)?;
            }
            MqttCommand::Status => {
                let config = load_config(cli.config.as_deref())?;
                mqtt::show_config(&mut std::io::stdout(), &config)?;
            }
        },
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
