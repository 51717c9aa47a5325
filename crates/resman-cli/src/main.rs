mod cmd_briefs;
mod cmd_chat;
mod cmd_config;
mod cmd_init;
mod cmd_log;
mod cmd_prune;
mod cmd_repo_map;
mod cmd_snapshot;
mod workspace;

use clap::{Parser, Subcommand};
use resman_ledger::archive::DEFAULT_SUMMARY_CHARS;
use resman_ledger::PrunePolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "resman",
    version,
    about = "Research assistant chat with an append-only conversation log"
)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the workspace layout in the current directory
    Init,
    /// Start an interactive chat session
    Chat {
        /// Model name (overrides config and RM_MODEL)
        #[arg(long)]
        model: Option<String>,
    },
    /// Inspect or edit the conversation log
    Log {
        #[command(subcommand)]
        cmd: cmd_log::LogCmd,
    },
    /// Copy the log into the archive
    Snapshot {
        /// Label appended to the snapshot file name
        #[arg(long, default_value = "manual")]
        label: String,
        /// List archived snapshots and summaries instead
        #[arg(long)]
        list: bool,
    },
    /// Write a conversation summary into the archive
    Summary {
        /// Markdown file to archive as the summary
        #[arg(long)]
        from: Option<PathBuf>,
        /// Ask the model to write the summary
        #[arg(long, conflicts_with = "from")]
        llm: bool,
        #[arg(long, default_value = "summary")]
        label: String,
        /// Transcript characters kept (from the end)
        #[arg(long, default_value_t = DEFAULT_SUMMARY_CHARS)]
        max_chars: usize,
    },
    /// Shrink the log to its most recent messages (snapshots first)
    Prune {
        /// messages (keeps tool records in the window) or turns (messages only)
        #[arg(long, default_value = "messages")]
        policy: PrunePolicy,
        /// Messages to keep (default: prune.keep_last)
        #[arg(long)]
        keep_last: Option<usize>,
        /// Show what would be kept without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Refresh cached briefs of the memos in memory/
    Briefs {
        /// Resummarize even when content is unchanged
        #[arg(long)]
        force: bool,
        /// Use the heuristic summarizer only
        #[arg(long)]
        no_llm: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the bounded file inventory of the workspace
    RepoMap {
        /// Maximum files listed (default: repo_map.max_files)
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Regenerate state/generated/project_index.md
    Index,
    /// Manage workspace configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir()?;

    match cli.cmd {
        Command::Init => cmd_init::execute(&cwd),
        Command::Chat { model } => cmd_chat::execute(&cwd, model.as_deref()),
        Command::Log { cmd } => cmd_log::run(cmd, &cwd),
        Command::Snapshot { label, list } => {
            if list {
                cmd_snapshot::list(&cwd)
            } else {
                cmd_snapshot::snapshot(&cwd, &label)
            }
        }
        Command::Summary {
            from,
            llm,
            label,
            max_chars,
        } => cmd_snapshot::summary(&cmd_snapshot::SummaryParams {
            repo_root: &cwd,
            from: from.as_deref(),
            llm,
            label: &label,
            max_chars,
        }),
        Command::Prune {
            policy,
            keep_last,
            dry_run,
        } => cmd_prune::execute(&cwd, policy, keep_last, dry_run),
        Command::Briefs {
            force,
            no_llm,
            json,
        } => cmd_briefs::execute(&cwd, force, no_llm, json),
        Command::RepoMap { max_files } => cmd_repo_map::execute(&cwd, max_files),
        Command::Index => cmd_repo_map::index(&cwd),
        Command::Config { cmd } => cmd_config::run(cmd, &cwd),
    }
}
