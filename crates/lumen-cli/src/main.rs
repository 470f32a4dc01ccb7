//! Lumen CLI - run scripts through the interruptible execution engine.

mod colors;
mod output;
mod repl;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lumen_core::{EngineConfig, InMemoryRegistry, Mode, ScriptEngine};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Interruptible script execution engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run in local development mode
    #[arg(long, global = true)]
    local_dev: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a script file once
    Run {
        /// Path to the script
        script: PathBuf,
    },

    /// Start an interactive session
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env()?,
    };
    if cli.local_dev {
        config = config.with_mode(Mode::LocalDev);
    }
    let engine = ScriptEngine::new(config, Arc::new(InMemoryRegistry::new()))?;

    let ok = match cli.command {
        Commands::Run { script } => run::execute(engine, &script).await?,
        Commands::Repl => repl::execute(engine).await?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
