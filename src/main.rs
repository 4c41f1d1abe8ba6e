use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use foldup::cli::{AppContext, Cli, Commands, ContextFlags};
use foldup::error::{DirectiveSyntaxError, EXIT_FAILURE, EXIT_OK, exit_code};
use foldup::infra::config::load_config_from;
use foldup::infra::signal::CancelFlag;
use foldup::{Engine, infra};
use miette::{GraphicalReportHandler, GraphicalTheme};

fn main() -> ExitCode {
    let cli = match Cli::try_parse().and_then(|cli| cli.validate().map(|_| cli)) {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version print to stdout and succeed
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_FAILURE } else { EXIT_OK });
        }
    };

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };
    infra::logging::init(&ctx);

    let result = match cli.command {
        Some(Commands::Init(args)) => infra::config::init(args, &ctx).map(|_| EXIT_OK),
        Some(Commands::Completions(args)) => foldup::completion::run(args, &ctx).map(|_| EXIT_OK),
        None => fold(cli.flags, &ctx),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            report(&err, &ctx);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Run the root context and print its stdout share.
fn fold(flags: ContextFlags, ctx: &AppContext) -> Result<u8> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let base = dunce::canonicalize(&cwd).unwrap_or(cwd);
    let config = load_config_from(&base)?;

    let cancel = CancelFlag::new();
    cancel.install_sigint();

    let engine = Engine::new(base, config, ctx.clone())?.with_cancel(cancel);
    let outcome = engine.run(flags)?;

    let mut out = io::stdout().lock();
    if let Err(e) = out
        .write_all(outcome.stdout.as_bytes())
        .and_then(|_| out.flush())
    {
        // A closed pipe (`fup | head`) is not an error
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(e).context("Failed to write to stdout");
        }
    }

    Ok(if outcome.is_success() {
        EXIT_OK
    } else {
        EXIT_FAILURE
    })
}

/// Directive syntax errors get a labeled source excerpt; everything else a
/// single log line with its context chain.
fn report(err: &anyhow::Error, ctx: &AppContext) {
    let syntax = err
        .chain()
        .find_map(|e| e.downcast_ref::<DirectiveSyntaxError>());

    if let Some(syntax) = syntax {
        let theme = if ctx.no_color {
            GraphicalTheme::unicode_nocolor()
        } else {
            GraphicalTheme::unicode()
        };
        let mut rendered = String::new();
        if GraphicalReportHandler::new_themed(theme)
            .render_report(&mut rendered, syntax)
            .is_ok()
        {
            eprint!("{rendered}");
            return;
        }
    }

    tracing::error!("{err:#}");
}
