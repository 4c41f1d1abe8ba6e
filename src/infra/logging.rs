//! Tracing subscriber setup. Diagnostics always go to stderr.

use tracing_subscriber::EnvFilter;

use crate::cli::AppContext;

/// Environment variable overriding the log filter (e.g. `foldup=debug`)
pub const LOG_ENV: &str = "FOLDUP_LOG";

/// Install the global subscriber. Safe to call more than once.
pub fn init(ctx: &AppContext)
{
    let default_level = if ctx.quiet
    {
        "error"
    }
    else if ctx.verbose
    {
        "debug"
    }
    else
    {
        "warn"
    };

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!ctx.no_color)
        .with_target(false)
        .without_time()
        .try_init();
}
