use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use glot_core::scaffold::GOOSEFOOT_MODE;
use glot_core::SortKey;

use crate::config::{
    DEFAULT_OUTPUT_FILE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_RECEIVER_PORT,
    DEFAULT_ROUTER, DEFAULT_TRANSFER_DIR,
};
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "glot",
    version,
    about = "Launch, query and retrieve simulations on a remote simulation service"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Router host the session connects to
    #[arg(long, global = true, env = "GLOT_ROUTER", default_value = DEFAULT_ROUTER)]
    pub router: String,

    /// Router port
    #[arg(long, global = true, env = "GLOT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address one specific server instead of the shared namespace
    #[arg(long, global = true, env = "GLOT_SERVER")]
    pub server: Option<String>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Replace existing diagnostic directories
    #[arg(long, global = true)]
    pub force: bool,

    /// Directory retrieved archives are unpacked into
    #[arg(long, global = true)]
    pub destination: Option<PathBuf>,

    /// Color search rows by outcome
    #[arg(long, global = true)]
    pub color: bool,

    /// Log every extracted archive entry
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Local directory mirrored to the remote staging area
    #[arg(long, global = true, env = "GLOT_TRANSFER_DIR", default_value = DEFAULT_TRANSFER_DIR)]
    pub transfer_dir: PathBuf,

    /// Port the remote side pushes archives to when no target is given
    #[arg(long, global = true, env = "GLOT_RECEIVER_PORT", default_value_t = DEFAULT_RECEIVER_PORT)]
    pub receiver_port: u16,

    /// JSON table of extra scaffold modes
    #[arg(long, global = true, env = "GLOT_SCAFFOLDS")]
    pub scaffolds: Option<PathBuf>,

    /// Give up waiting for a completion event after this many seconds
    #[arg(long, global = true, env = "GLOT_WAIT_TIMEOUT_SECS")]
    pub wait_timeout_secs: Option<u64>,

    /// Event polling interval of the HTTP bridge
    #[arg(long, global = true, env = "GLOT_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bundle inputs, send the descriptor and start a simulation
    Launch(LaunchArgs),
    /// Cancel a running simulation
    Cancel {
        guid: String,
    },
    /// Show the status of one simulation
    Status {
        guid: String,
    },
    /// List simulations known to the service
    Search(SearchArgs),
    /// Retrieve the results archive of a simulation
    Results(ResultsArgs),
    /// Retrieve the diagnostic archive of a simulation
    Diagnostic(DiagnosticArgs),
    /// Unpack a local diagnostic archive onto its scaffold
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Simulation descriptor (XML)
    pub descriptor: PathBuf,

    /// Working subdirectory on the remote side
    #[arg(long)]
    pub subdirectory: String,

    /// Input file to bundle (repeatable)
    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,

    /// Definition file to bundle (repeatable)
    #[arg(long = "definition")]
    pub definitions: Vec<PathBuf>,

    /// Leave remote state in place after the run terminates
    #[arg(long)]
    pub skip_clean: bool,

    /// Output file fetched on completion (repeatable)
    #[arg(long = "output-file", default_value = DEFAULT_OUTPUT_FILE)]
    pub output_files: Vec<String>,

    /// Return after starting instead of waiting for the run to terminate
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Timestamp,
    Guid,
}

impl From<SortArg> for SortKey {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Timestamp => SortKey::Timestamp,
            SortArg::Guid => SortKey::Guid,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Only simulations whose guid matches
    pub guid: Option<String>,

    /// Rows shown after sorting
    #[arg(long)]
    pub limit: Option<usize>,

    /// Rows requested from the service
    #[arg(long)]
    pub server_limit: Option<u32>,

    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Draw a box-drawing grid around the table
    #[arg(long)]
    pub fancy: bool,
}

#[derive(Args, Debug)]
pub struct ResultsArgs {
    pub guid: String,

    /// Remote target to push results to instead of this machine
    #[arg(long)]
    pub target: Option<String>,

    #[arg(long)]
    pub include_diagnostic: bool,

    /// Fetch and unpack the diagnostic archive too
    #[arg(long)]
    pub inspect_diagnostic: bool,
}

#[derive(Args, Debug)]
pub struct DiagnosticArgs {
    pub guid: String,

    #[arg(long)]
    pub target: Option<String>,

    /// Unpack the archive onto its scaffold
    #[arg(long)]
    pub inspect: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Diagnostic archive (.tgz)
    pub archive: PathBuf,

    /// Destination directory; defaults to the archive path without extension
    #[arg(long)]
    pub to: Option<PathBuf>,

    /// Scaffold mode
    #[arg(long, default_value = GOOSEFOOT_MODE)]
    pub mode: String,
}
