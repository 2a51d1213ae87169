//! lightrun - workspace script and binary runner
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use lightrun::cli::{Cli, Commands};
use lightrun::config::{Config, ConfigManager};
use lightrun::error::LightrunResult;
use lightrun::ui;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => exit_code(code),
        Err(e) => {
            ui::error(&e.to_string());
            if let Some(hint) = e.hint() {
                ui::hint(hint);
            }
            exit_code(e.exit_code())
        }
    }
}

async fn run() -> LightrunResult<i32> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);

    // Dispatch to command
    match cli.command {
        Commands::Run(args) => lightrun::cli::commands::run(args, &config).await,
        Commands::Exec(args) => lightrun::cli::commands::exec(args, &config).await,
        Commands::Node(args) => lightrun::cli::commands::node(args, &config).await,
        Commands::Cache(args) => lightrun::cli::commands::cache(args, &config).await,
        Commands::Hook(args) => lightrun::cli::commands::hook(args, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; always on stderr
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("lightrun=warn"),
        1 => EnvFilter::new("lightrun=info"),
        _ => EnvFilter::new("lightrun=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Child exit codes outside 0..=255 cannot be reported verbatim
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
