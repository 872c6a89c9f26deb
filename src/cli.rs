use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::app::{self, SessionInput};
use crate::config::Config;
use crate::executor::ExecutionContext;
use crate::init::InitBuilder;
use crate::parser::parse_line;

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(about = "Cadenza - an async-aware interactive console", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Startup script executed before the session begins
    #[arg(long, global = true)]
    pub startup: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session (the default)
    Repl,

    /// Execute a script file on the session scheduler, then exit
    Run {
        /// Script file to execute, one statement per line
        file: String,
    },

    /// Evaluate statements and print their results, then exit
    Eval {
        /// Source to evaluate; may contain newlines
        source: String,
    },

    /// Parse a statement and dump the resulting unit
    Check {
        /// Source to parse
        source: String,
    },
}

/// Run the CLI by parsing process arguments. Returns the process exit status.
pub fn run_cli() -> Result<i32> {
    run_cli_with_args(Cli::parse())
}

fn run_cli_with_args(cli: Cli) -> Result<i32> {
    // Apply CLI overrides to environment before loading configuration
    if let Some(path) = &cli.config {
        env::set_var("CADENZA_CONFIG_PATH", path);
    }
    if let Some(path) = &cli.startup {
        env::set_var("CADENZA_STARTUP_PATH", path);
    }

    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let ctx = build_context(&config)?;
            app::start(ctx, &config, SessionInput::Interactive)
        }
        Commands::Run { file } => {
            let source = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read script {}", file))?;
            let ctx = build_context(&config)?;
            app::start(ctx, &config, SessionInput::Script { source, echo: false })
        }
        Commands::Eval { source } => {
            let ctx = build_context(&config)?;
            app::start(ctx, &config, SessionInput::Script { source, echo: true })
        }
        Commands::Check { source } => match parse_line(&source) {
            Ok(unit) => {
                let json = serde_json::to_string_pretty(&unit)
                    .context("Failed to serialize unit")?;
                println!("{}", json);
                Ok(0)
            }
            Err(err) => {
                eprintln!("{}", err);
                Ok(1)
            }
        },
    }
}

fn build_context(config: &Config) -> Result<Arc<ExecutionContext>> {
    let mut builder = InitBuilder::new();
    if let Some(path) = &config.startup_path {
        builder = builder.startup_path(path);
    }
    builder.build()
}
