//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// lightrun - run workspace scripts and dependency binaries
///
/// Resolves a name to a declared script, a binary exposed by a dependency,
/// or a plain shell command, and runs it with every workspace binary on PATH.
#[derive(Parser, Debug)]
#[command(name = "lightrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LIGHTRUN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a declared script or a dependency binary
    Run(RunArgs),

    /// Execute a command with the workspace binaries on PATH
    Exec(ExecArgs),

    /// Run the interpreter inside the workspace environment
    Node(NodeArgs),

    /// Manage the binary cache
    Cache(CacheArgs),

    /// Lifecycle hooks invoked by the package manager
    Hook(HookArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Forward --inspect[=host:port] to the interpreter
    #[arg(long, value_name = "ADDR", require_equals = true, num_args = 0..=1)]
    pub inspect: Option<Option<String>>,

    /// Forward --inspect-brk[=host:port] to the interpreter
    #[arg(long, value_name = "ADDR", require_equals = true, num_args = 0..=1)]
    pub inspect_brk: Option<Option<String>>,

    /// Resolve against the top-level workspace
    #[arg(short = 'T', long)]
    pub top_level: bool,

    /// Ignore declared scripts, only run binaries
    #[arg(short = 'B', long)]
    pub binaries_only: bool,

    /// Suppress progress output
    #[arg(long)]
    pub silent: bool,

    /// Script or binary name
    pub name: String,

    /// Arguments passed to the script or binary
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    /// Trailing arguments without a leading `--` separator
    pub fn forwarded_args(&self) -> Vec<String> {
        strip_separator(&self.args)
    }
}

/// Arguments for the exec command
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Command to execute
    pub command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl ExecArgs {
    /// Trailing arguments without a leading `--` separator
    pub fn forwarded_args(&self) -> Vec<String> {
        strip_separator(&self.args)
    }
}

/// Arguments for the node command
#[derive(Parser, Debug)]
pub struct NodeArgs {
    /// Arguments passed to the interpreter
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached workspaces
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every cached entry
    Clear,

    /// Show the cache directory
    Path,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the hook command
#[derive(Parser, Debug)]
pub struct HookArgs {
    #[command(subcommand)]
    pub event: HookEvent,
}

/// Package manager lifecycle events
#[derive(Subcommand, Debug)]
pub enum HookEvent {
    /// Dependencies were installed or updated
    AfterInstall,
}

fn strip_separator(args: &[String]) -> Vec<String> {
    match args.split_first() {
        Some((first, rest)) if first == "--" => rest.to_vec(),
        _ => args.to_vec(),
    }
}
