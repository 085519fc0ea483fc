use std::path::PathBuf;
use std::time::Duration;

use glot_core::error::Result;
use glot_core::{ProcedureNamespace, RetrievalOptions, ScaffoldTable};

use crate::cli::GlobalArgs;

pub const DEFAULT_ROUTER: &str = "localhost";
pub const DEFAULT_PORT: u16 = 18080;
pub const DEFAULT_TRANSFER_DIR: &str = "/tmp";
pub const DEFAULT_OUTPUT_FILE: &str = "output.vtp";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Port the remote side pushes archives to when no target is given.
pub const DEFAULT_RECEIVER_PORT: u16 = 18081;

/// Settings shared by every subcommand, resolved from flags and their
/// `GLOT_*` environment fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub router: String,
    pub port: u16,
    pub server: Option<String>,
    pub transfer_dir: PathBuf,
    /// Local port for pushed archives; the remote side must be configured
    /// to deliver there since no address is sent with the request.
    pub receiver_port: u16,
    pub scaffolds: Option<PathBuf>,
    pub wait_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub force: bool,
    pub destination: Option<PathBuf>,
    pub color: bool,
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            router: DEFAULT_ROUTER.to_string(),
            port: DEFAULT_PORT,
            server: None,
            transfer_dir: PathBuf::from(DEFAULT_TRANSFER_DIR),
            receiver_port: DEFAULT_RECEIVER_PORT,
            scaffolds: None,
            wait_timeout: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            force: false,
            destination: None,
            color: false,
            verbose: false,
        }
    }
}

impl ClientConfig {
    pub fn from_args(args: &GlobalArgs) -> Self {
        Self {
            router: args.router.clone(),
            port: args.port,
            server: args.server.clone(),
            transfer_dir: args.transfer_dir.clone(),
            receiver_port: args.receiver_port,
            scaffolds: args.scaffolds.clone(),
            wait_timeout: args
                .wait_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
            force: args.force,
            destination: args.destination.clone(),
            color: args.color,
            verbose: args.verbose,
        }
    }

    /// Base URL of the router's HTTP bridge.
    pub fn router_url(&self) -> String {
        let router = self.router.trim_end_matches('/');
        if router.starts_with("http://") || router.starts_with("https://") {
            format!("{router}:{}", self.port)
        } else {
            format!("http://{router}:{}", self.port)
        }
    }

    pub fn namespace(&self) -> ProcedureNamespace {
        ProcedureNamespace::new(self.server.clone())
    }

    /// Built-in scaffold modes, extended by the configured JSON table.
    pub fn scaffold_table(&self) -> Result<ScaffoldTable> {
        match &self.scaffolds {
            Some(path) => ScaffoldTable::from_json_file(path),
            None => Ok(ScaffoldTable::default()),
        }
    }

    pub fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            destination: self.destination.clone(),
            color: self.color,
            ..RetrievalOptions::default()
        }
    }
}
