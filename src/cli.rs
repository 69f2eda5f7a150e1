use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lunchbox",
    version,
    about = "Boot checks for a Vagrant-managed Drupal development VM"
)]
pub struct Cli {
    /// Path to config file (default: ./lunchbox.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding settings, plugins and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every boot group in order
    Boot,

    /// Run only the named groups, in the order given
    Run {
        /// Group to run (repeatable)
        #[arg(short, long = "group", required = true)]
        groups: Vec<String>,
    },

    /// Load settings and check host prerequisites
    Check,

    /// List boot groups and their operations
    Groups,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Progress bar on a terminal, plain lines otherwise
    Auto,
    /// Progress bar with styled status lines
    Interactive,
    /// Plain lines, no ANSI
    Plain,
}
