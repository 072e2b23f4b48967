use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod ui;

use cli::{Cli, Commands, IdentifyCommands};
use commands::{identify, values};
use forge_resolve::config::FeatureFlags;

fn main() {
    let cli = Cli::parse();

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    // stdout carries command output, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    if let Err(e) = run(cli) {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Override tables are read once; resolution never touches the environment again
    let flags = FeatureFlags::from_env();

    match cli.command {
        Commands::Identify { command } => match command {
            IdentifyCommands::PrimaryIngress { generator } => identify::primary_ingress(&generator, &flags),
            IdentifyCommands::Ingress { generator } => identify::ingress(&generator, &flags),
            IdentifyCommands::NativeCronjobs { generator } => identify::native_cronjobs(&generator, &flags),
        },
        Commands::Values { generator } => values::execute(&generator, &flags),
    }
}
