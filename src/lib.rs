pub mod api;
pub mod clipboard;
pub mod config;
pub mod highlight;
pub mod links;
pub mod opener;
pub mod route;
pub mod store;
pub mod timefmt;
pub mod views;
pub mod worker;

mod app;
pub mod cli;
mod tui;

#[doc(hidden)]
pub mod test_support;

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{CommandFactory, Parser};
use cli::Command;

pub use app::AppError;
pub use cli::Cli;
pub use route::Route;

/// Run the atx CLI entrypoint.
///
/// # Errors
///
/// Returns an error when initialization or the chosen command fails to execute.
pub fn run(cli: &Cli) -> color_eyre::Result<()> {
    init_tracing(cli);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Command::Completions(cmd)) => {
            clap_complete::generate(cmd.shell, &mut command(), "atx", &mut out);
            return Ok(());
        }
        Some(Command::Man) => {
            clap_mangen::Man::new(command()).render(&mut out)?;
            return Ok(());
        }
        _ => {}
    }

    let mut app = app::App::bootstrap(cli)?;

    match &cli.command {
        Some(Command::Search(cmd)) => app.search(cmd, &mut out),
        Some(Command::Graph(cmd)) => app.graph(cmd, &mut out),
        Some(Command::StreamGraph(cmd)) => app.stream_graph(cmd, &mut out),
        Some(Command::Transcript(cmd)) => app.transcript(cmd, &mut out),
        Some(Command::Link(cmd)) => app.link(cmd, &mut out),
        Some(Command::Membership(cmd)) => app.membership(cmd, &mut out),
        Some(Command::Settings(cmd)) => app.settings(cmd, &mut out),
        Some(Command::Config(cmd)) => app.config_command(cmd, &mut out),
        Some(Command::Open(cmd)) => {
            let route = Route::parse(&cmd.route)
                .map_err(|err| AppError::Validation(err.to_string()))?;
            drop(out);
            app.run_ui(route)
        }
        Some(Command::Completions(_) | Command::Man) => Ok(()),
        None => {
            drop(out);
            app.run_ui(Route::Home)
        }
    }
}

/// Parse process arguments.
#[must_use]
pub fn parse_cli() -> Cli {
    #[cfg(target_os = "macos")]
    {
        use clap::{ColorChoice, FromArgMatches};

        let matches = Cli::command().color(ColorChoice::Never).get_matches();
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }
    #[cfg(not(target_os = "macos"))]
    {
        Cli::parse()
    }
}

/// Exit status for a failed run: 2 for rejected input, 3 when the server said
/// the subject does not exist, 1 otherwise.
#[must_use]
pub fn exit_code_for_error(err: &color_eyre::Report) -> i32 {
    for cause in err.chain() {
        if let Some(AppError::Validation(_)) = cause.downcast_ref::<AppError>() {
            return 2;
        }
        if cause
            .downcast_ref::<api::ApiError>()
            .is_some_and(api::ApiError::is_not_found)
        {
            return 3;
        }
    }
    1
}

/// Print `atx: <error>` followed by one `caused by:` line per source.
///
/// # Errors
///
/// Returns an error when `out` cannot be written.
pub fn write_cli_error(err: &color_eyre::Report, out: &mut dyn Write) -> io::Result<()> {
    let mut chain = err.chain();
    if let Some(head) = chain.next() {
        writeln!(out, "atx: {head}")?;
    }
    for cause in chain {
        writeln!(out, "    caused by: {cause}")?;
    }
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = desired_level(cli);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(|| LogWriter)
        .try_init();
}

/// Set while the terminal UI owns the screen; log lines are dropped meanwhile.
pub(crate) static TERMINAL_UI_ACTIVE: AtomicBool = AtomicBool::new(false);

struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if TERMINAL_UI_ACTIVE.load(Ordering::Relaxed) {
            return Ok(buf.len());
        }
        io::stderr().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

fn desired_level(cli: &Cli) -> tracing::level_filters::LevelFilter {
    if cli.quiet {
        return tracing::level_filters::LevelFilter::ERROR;
    }

    match cli.verbose {
        0 => tracing::level_filters::LevelFilter::WARN,
        1 => tracing::level_filters::LevelFilter::INFO,
        2 => tracing::level_filters::LevelFilter::DEBUG,
        _ => tracing::level_filters::LevelFilter::TRACE,
    }
}

#[must_use]
pub fn command() -> clap::Command {
    Cli::command()
}
