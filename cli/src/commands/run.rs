//! Run and exec commands - launch a plan in the foreground.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use portlaunch_core::domain::DEFAULT_ADDRESS;
use portlaunch_core::{
    CleanupPolicy, ConfigStore, Error, HealthCheck, HttpHealthProbe, LaunchOutcome, LaunchPlan,
    Launcher, PortScanner, Prerequisite, ProcessKiller, ServiceSpec,
};

use crate::signal::shutdown_signal;

/// Ad-hoc launch of a single foreground command.
#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Port the service listens on; substituted for `{port}`
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Bind address; substituted for `{address}`
    #[arg(short, long, default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Service label (defaults to the program's file name)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Directory that must exist before launching
    #[arg(long = "require-dir", value_name = "DIR")]
    pub require_dirs: Vec<PathBuf>,

    /// File that must exist before launching
    #[arg(long = "require-file", value_name = "FILE")]
    pub require_files: Vec<PathBuf>,

    /// Extra environment variable for the service
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Pause after killing stale listeners, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub settle_ms: u64,

    /// Program and arguments, after `--`
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl ExecArgs {
    /// Build the launch plan these arguments describe.
    pub fn to_plan(&self) -> Result<LaunchPlan> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("No command given");
        };

        let name = match &self.name {
            Some(name) => name.clone(),
            None => Path::new(program)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.clone()),
        };

        let mut service = ServiceSpec::new(name, program.clone(), self.port)
            .with_args(args.iter().cloned())
            .with_address(self.address.clone());
        for (key, value) in &self.env {
            service = service.with_env(key.clone(), value.clone());
        }

        let prerequisites = self
            .require_dirs
            .iter()
            .map(Prerequisite::directory)
            .chain(self.require_files.iter().map(Prerequisite::file));

        let mut plan = LaunchPlan::new(service).with_cleanup(CleanupPolicy {
            settle: Duration::from_millis(self.settle_ms),
            ..CleanupPolicy::default()
        });
        for prereq in prerequisites {
            plan = plan.require(prereq);
        }
        Ok(plan)
    }
}

fn parse_env(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Launch a stored profile.
pub async fn profile(store: &ConfigStore, name: &str, json: bool) -> Result<i32> {
    let plan = store.get_profile(name).await?;
    launch(&plan, json).await
}

/// Launch an ad-hoc command.
pub async fn exec(args: &ExecArgs, json: bool) -> Result<i32> {
    let plan = args.to_plan()?;
    launch(&plan, json).await
}

/// Run `plan` until the foreground exits or a signal arrives.
///
/// Returns the launcher's exit code. Failed checks are reported here and
/// map to 1; other errors propagate.
async fn launch(plan: &LaunchPlan, json: bool) -> Result<i32> {
    let timeout = plan
        .background
        .as_ref()
        .map(|dependency| dependency.health.timeout)
        .unwrap_or_else(|| HealthCheck::default().timeout);

    let base_dir = std::env::current_dir().context("Cannot read the current directory")?;
    let launcher = Launcher::new(
        PortScanner::new(),
        ProcessKiller::new(),
        HttpHealthProbe::new(timeout)?,
        base_dir,
    );

    if !json {
        if let Some(dependency) = &plan.background {
            println!(
                "Starting {} on {}",
                dependency.service.name,
                dependency.service.endpoint()
            );
        }
        println!(
            "Starting {} on {}",
            plan.foreground.name,
            plan.foreground.endpoint()
        );
    }

    match launcher.run(plan, shutdown_signal()).await {
        Ok(outcome) => {
            print_outcome(plan, &outcome, json)?;
            Ok(outcome.exit_code)
        }
        Err(Error::MissingPrerequisites(missing)) => {
            eprintln!("Missing prerequisites:");
            for prereq in &missing {
                eprintln!("  {} {}", prereq.kind, prereq.path.display());
                eprintln!("    {}", prereq.hint_or_default());
            }
            Ok(1)
        }
        Err(e @ Error::HealthCheckFailed { .. }) => {
            eprintln!("Error: {}", e);
            if let Some(dependency) = &plan.background {
                eprintln!("{}", dependency.health.hint_or_default());
            }
            Ok(1)
        }
        Err(e @ Error::SpawnFailed { .. }) => {
            eprintln!("Error: {}", e);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_outcome(plan: &LaunchPlan, outcome: &LaunchOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    for report in outcome.cleanup.iter().filter(|r| !r.was_noop()) {
        println!("{}", report);
    }

    match outcome.signal {
        Some(signal) => println!("{} stopped ({})", plan.foreground.name, signal.label()),
        None => println!(
            "{} exited with code {}",
            plan.foreground.name, outcome.exit_code
        ),
    }
    Ok(())
}
