use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use logtail::cli;
use logtail::connection::protocol::Amount;
use logtail::render::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "logtail")]
#[command(about = "Stream, classify, and filter remote log files over a websocket")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct TailArgs {
    /// How much of the file to fetch, e.g. 1mb, 0.5mb, 256kb
    #[arg(long)]
    amount: Option<Amount>,
    /// Only match lines against this filter pattern
    #[arg(long)]
    filter: Option<String>,
    /// Start in the error-focus view
    #[arg(long)]
    errors_only: bool,
    /// Send diagnostics to stderr instead of the log file
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Tail a log file live; stdin lines act as controls (q to quit)
    Watch {
        /// Websocket endpoint of the log-viewer server
        #[arg(long)]
        url: Option<String>,
        /// Log file to open on start
        #[arg(long)]
        file: Option<String>,
        /// Keep streaming appended data
        #[arg(long, overrides_with = "no_follow")]
        follow: bool,
        /// Fetch the excerpt only
        #[arg(long)]
        no_follow: bool,
        #[command(flatten)]
        tail: TailArgs,
    },
    /// Run a local log file through the pipeline and print the view
    Replay {
        /// Log file to replay
        path: PathBuf,
        /// Bytes per simulated network chunk
        #[arg(long, default_value = "4096")]
        chunk_size: usize,
        /// Output format: text (default), json
        #[arg(long, default_value = "text")]
        format: String,
        #[command(flatten)]
        tail: TailArgs,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write the default config to ~/.logtail/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set one value, e.g. `tail.follow false`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn overrides(tail: TailArgs) -> cli::Overrides {
    cli::Overrides {
        amount: tail.amount,
        filter: tail.filter,
        errors_only: tail.errors_only,
        verbose: tail.verbose,
        ..cli::Overrides::default()
    }
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Watch {
            url,
            file,
            follow,
            no_follow,
            tail,
        } => {
            let follow = match (follow, no_follow) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cli::run_watch(cli::Overrides {
                url,
                file,
                follow,
                ..overrides(tail)
            })
        }
        Commands::Replay {
            path,
            chunk_size,
            format,
            tail,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_replay(&path, chunk_size, fmt, overrides(tail))
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
