//! PortLaunch CLI - Free a port and launch a service on it
//!
//! Runs named launch profiles or ad-hoc commands, and inspects or frees
//! local ports.

mod commands;
mod logging;
mod signal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use portlaunch_core::ConfigStore;

use commands::run::ExecArgs;

#[derive(Parser)]
#[command(name = "portlaunch")]
#[command(author, version, about = "Free a local port and launch a service on it")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the profile configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a stored profile
    Run {
        /// Profile name
        profile: String,
    },

    /// Free a port and run a command on it in the foreground
    Exec(ExecArgs),

    /// Kill whatever listens on a port
    Free {
        /// Port number to free
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,

        /// Label used in log output
        #[arg(short = 'n', long, default_value = "service")]
        name: String,

        /// Pause after killing before re-checking, in milliseconds
        #[arg(long, default_value_t = 2000)]
        settle_ms: u64,
    },

    /// Show the processes listening on a port
    #[command(alias = "ls")]
    Check {
        /// Port number to inspect
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
    },

    /// List stored profiles
    Profiles,

    /// Show current configuration
    Config,
}

impl Cli {
    fn store(&self) -> anyhow::Result<ConfigStore> {
        Ok(match &self.config {
            Some(path) => ConfigStore::with_path(path.clone()),
            None => ConfigStore::new()?,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Failed to initialise logging: {:#}", e);
    }

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(exit_status(code)),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Run { profile } => {
            let store = cli.store()?;
            commands::run::profile(&store, profile, cli.json).await
        }
        Commands::Exec(args) => commands::run::exec(args, cli.json).await,
        Commands::Free {
            port,
            name,
            settle_ms,
        } => {
            commands::free::run(*port, name, *settle_ms, cli.json).await?;
            Ok(0)
        }
        Commands::Check { port } => {
            commands::check::run(*port, cli.json).await?;
            Ok(0)
        }
        Commands::Profiles => {
            commands::profiles::list(&cli.store()?, cli.json).await?;
            Ok(0)
        }
        Commands::Config => {
            commands::config::show(&cli.store()?, cli.json).await?;
            Ok(0)
        }
    }
}

/// Exit codes outside `0..=255` cannot be reported faithfully and become 1.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
