//! Logging setup.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level to debug and
/// `-vv` to trace.
pub fn init(verbosity: u8) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(verbosity))?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "portlaunch=info,portlaunch_core=info",
        1 => "portlaunch=debug,portlaunch_core=debug",
        _ => "portlaunch=trace,portlaunch_core=trace",
    }
}
