#![forbid(unsafe_code)]

mod cmd;
mod output;
mod snapshot;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "pipesink: build a sink job once its upstream pipeline settled",
    long_about = None
)]
struct Cli {
    /// Log the pipeline graph on every tick.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run one trigger tick",
        long_about = "Evaluate the pipeline described by a host snapshot and decide whether the sink should be built.",
        after_help = "EXAMPLES:\n    # First run primes the fingerprint, later runs trigger on change\n    pipesink tick --host host.toml --config Deploy.toml --state-dir .pipesink/Deploy\n\n    # Emit machine-readable output\n    pipesink tick --host host.toml --config Deploy.toml --state-dir .pipesink/Deploy --json"
    )]
    Tick(cmd::tick::TickArgs),

    #[command(
        about = "Show the pipeline graph",
        long_about = "Print the pipeline a trigger would evaluate, with exclusions applied, and report cycles.",
        after_help = "EXAMPLES:\n    pipesink graph --host host.toml --config Deploy.toml"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        about = "Follow a job rename",
        long_about = "Rewrite root, sink and exclusion names in every given trigger config after a job was renamed.",
        after_help = "EXAMPLES:\n    pipesink rename --config Deploy.toml --config Nightly.toml Build Build-v2"
    )]
    Rename(cmd::maintain::RenameArgs),

    #[command(
        about = "Follow a job deletion",
        long_about = "Remove a deleted job from the exclusion list of every given trigger config.",
        after_help = "EXAMPLES:\n    pipesink delete --config Deploy.toml Legacy-Tests"
    )]
    Delete(cmd::maintain::DeleteArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PIPESINK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "pipesink=debug,info"
        } else {
            "pipesink=info,warn"
        })
    });

    let format = env::var("PIPESINK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output only.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();
    debug!(?output, verbose = cli.verbose, "pipesink starting");

    match &cli.command {
        Commands::Tick(args) => cmd::tick::run_tick(args, cli.verbose, output),
        Commands::Graph(args) => cmd::graph::run_graph(args, output),
        Commands::Rename(args) => cmd::maintain::run_rename(args, output),
        Commands::Delete(args) => cmd::maintain::run_delete(args, output),
    }
}
