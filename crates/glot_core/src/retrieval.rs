//! Status, search, results and diagnostic retrieval.
//!
//! Archives pushed back by the remote side arrive through an
//! [`ArtifactReceiver`] when no explicit target is given.

use std::path::{Component, Path, PathBuf};

use chrono::{Local, TimeZone};
use serde_json::Value;

use crate::contract::{ExitOutcome, SimulationSummary};
use crate::diagnostic::{archive_prefix, extract_archive, DiagnosticUnpacker};
use crate::error::{GlotError, Result};
use crate::scaffold::GOOSEFOOT_MODE;
use crate::service::SimulationService;
use crate::table::{RowColor, Table};

const MESSAGE_WIDTH: usize = 60;
const TIMESTAMP_FORMAT: &str = "%A %d, %B %Y :: %H:%M:%S";

/// Local endpoint the remote side can push a single file to.
pub trait ArtifactReceiver {
    /// Start listening for a file that will be stored as `filename`.
    fn listen(&self, filename: &str) -> Result<Box<dyn PendingArtifact>, String>;
}

/// A receiver waiting for exactly one pushed file.
pub trait PendingArtifact {
    /// Block until the file has arrived and return where it was written.
    fn wait(self: Box<Self>) -> Result<PathBuf, String>;

    /// Stop waiting without receiving anything.
    fn cancel(self: Box<Self>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Timestamp,
    Guid,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Guid => "guid",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub guid: Option<String>,
    /// Rows kept locally after sorting.
    pub limit: Option<usize>,
    /// Bound passed to the remote `search` call.
    pub server_limit: Option<u32>,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalOptions {
    /// Where received archives are unpacked; `.` for results when unset.
    pub destination: Option<PathBuf>,
    pub color: bool,
    pub mode: String,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            destination: None,
            color: false,
            mode: GOOSEFOOT_MODE.to_string(),
        }
    }
}

pub struct ResultsRetriever {
    service: SimulationService,
    receiver: Box<dyn ArtifactReceiver>,
    unpacker: DiagnosticUnpacker,
    options: RetrievalOptions,
}

impl ResultsRetriever {
    pub fn new(
        service: SimulationService,
        receiver: Box<dyn ArtifactReceiver>,
        unpacker: DiagnosticUnpacker,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            service,
            receiver,
            unpacker,
            options,
        }
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Two-column table of the remote status map.
    pub fn status(&self, guid: &str) -> Result<Table> {
        let Some(status) = self.service.retrieve_status(guid)? else {
            return Err(GlotError::NotFound {
                guid: guid.to_string(),
            });
        };

        let mut table = Table::default();
        for (key, value) in status {
            table.push_row(vec![key, display_value(&value)]);
        }
        Ok(table)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Table> {
        let definitions = self.service.search(query.guid.as_deref(), query.server_limit)?;

        let mut rows: Vec<SearchRow> = Vec::with_capacity(definitions.len());
        for (guid, definition) in definitions {
            match serde_json::from_value::<SimulationSummary>(definition) {
                Ok(summary) => rows.push(SearchRow { guid, summary }),
                Err(error) => tracing::error!(guid = %guid, %error, "could not format search row"),
            }
        }

        match query.sort {
            Some(SortKey::Timestamp) => rows.sort_by(|left, right| right.timestamp().total_cmp(&left.timestamp())),
            Some(SortKey::Guid) => rows.sort_by(|left, right| left.guid.cmp(&right.guid)),
            None => {}
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        let mut table = Table::new(
            ["GUID", "Set Up", "Last status", "%", "", "Completed"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        for row in rows {
            let color = self.options.color.then(|| row.color());
            table.push_colored_row(row.cells(), color);
        }
        Ok(table)
    }

    /// Ask for the results archive and optionally its diagnostics.
    ///
    /// Without `target` the archive is pushed to a local receiver as
    /// `<guid>-results.tgz`; the received path is returned.
    pub fn results(
        &self,
        guid: &str,
        target: Option<&str>,
        include_diagnostic: bool,
        inspect_diagnostic: bool,
    ) -> Result<Option<PathBuf>> {
        let pending = match target {
            Some(_) => None,
            None => {
                tracing::warn!("no target given, receiving results locally");
                Some(self.listen(&format!("{guid}-results.tgz"))?)
            }
        };

        let found = self.service.request_results(guid, target)?;
        if !found {
            if let Some(pending) = pending {
                pending.cancel();
            }
            tracing::error!("simulation [{guid}] not found");
            return Err(GlotError::NotFound {
                guid: guid.to_string(),
            });
        }

        let received = match pending {
            Some(pending) => Some(pending.wait().map_err(GlotError::Receiver)?),
            None => None,
        };
        if let Some(path) = &received {
            tracing::info!(path = %path.display(), "received results");
        }

        let destination = match (&self.options.destination, target) {
            (Some(destination), _) => Some(destination.clone()),
            (None, None) => Some(PathBuf::from(".")),
            (None, Some(_)) => None,
        };

        if include_diagnostic || inspect_diagnostic {
            self.fetch_diagnostic(guid, target, inspect_diagnostic, destination.as_deref())?;
        }

        if let (Some(archive), Some(destination), true) = (&received, &destination, inspect_diagnostic) {
            extract_archive(archive, destination)?;
            tracing::info!(destination = %destination.display(), "extracted results");
        }
        Ok(received)
    }

    /// Ask for the diagnostic archives of a run.
    ///
    /// With `inspect`, the single archive is unpacked onto its scaffold and
    /// its path returned.
    ///
    /// # Errors
    ///
    /// [`GlotError::AmbiguousDiagnostic`] when `inspect` is set and more than
    /// one archive exists, since only one can be pushed or chosen.
    pub fn diagnostic(&self, guid: &str, target: Option<&str>, inspect: bool) -> Result<Option<PathBuf>> {
        self.fetch_diagnostic(guid, target, inspect, self.options.destination.as_deref())
    }

    fn fetch_diagnostic(
        &self,
        guid: &str,
        target: Option<&str>,
        inspect: bool,
        root: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        let pending = match target {
            Some(_) => None,
            None => Some(self.listen(&format!("{guid}-diagnostic.tgz"))?),
        };

        let files = self.service.request_diagnostic(guid, target)?;
        if files.is_empty() {
            if let Some(pending) = pending {
                pending.cancel();
            }
            tracing::warn!("no simulation diagnostics found for [{guid}]");
            return Ok(None);
        }
        for (name, path) in &files {
            tracing::info!(name = %name, path = %path, "diagnostic file");
        }

        if inspect && files.len() > 1 {
            if let Some(pending) = pending {
                pending.cancel();
            }
            return Err(GlotError::AmbiguousDiagnostic { count: files.len() });
        }

        let received = match pending {
            Some(pending) => Some(pending.wait().map_err(GlotError::Receiver)?),
            None => None,
        };
        if !inspect {
            return Ok(received);
        }

        // With a target the archive was delivered there under its file name.
        let archive = match received {
            Some(path) => path,
            None => match files.keys().next() {
                Some(name) => PathBuf::from(name),
                None => return Ok(None),
            },
        };
        let destination = match (target, root) {
            (None, Some(root)) => Some(unpack_root(root, &archive)?),
            _ => None,
        };
        let unpacked = self
            .unpacker
            .inspect(&archive, destination.as_deref(), &self.options.mode)?;
        tracing::info!(path = %unpacked.display(), "diagnostic ready");
        Ok(Some(archive))
    }

    /// Unpack a local diagnostic archive without contacting the remote side.
    pub fn inspect(&self, archive: &Path, destination: Option<&Path>, mode: &str) -> Result<PathBuf> {
        self.unpacker.inspect(archive, destination, mode)
    }

    fn listen(&self, filename: &str) -> Result<Box<dyn PendingArtifact>> {
        self.receiver.listen(filename).map_err(GlotError::Receiver)
    }
}

// Directory under `root` named after the archive's shared prefix. Without
// a usable prefix the archive stem is used so `root` itself is never replaced.
fn unpack_root(root: &Path, archive: &Path) -> Result<PathBuf> {
    let prefix = archive_prefix(archive)?;
    let prefix = Path::new(prefix.trim_end_matches('/'));
    let usable = prefix.components().next().is_some()
        && prefix.components().all(|part| matches!(part, Component::Normal(_)));
    if usable {
        return Ok(root.join(prefix));
    }
    let stem = archive
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("diagnostic"));
    Ok(root.join(stem))
}

struct SearchRow {
    guid: String,
    summary: SimulationSummary,
}

impl SearchRow {
    fn timestamp(&self) -> f64 {
        self.summary.timestamp().unwrap_or(0.0)
    }

    fn color(&self) -> RowColor {
        match self.summary.outcome() {
            ExitOutcome::Pending => RowColor::Yellow,
            ExitOutcome::Succeeded => RowColor::Green,
            ExitOutcome::Failed => RowColor::Red,
        }
    }

    fn cells(&self) -> Vec<String> {
        let status = self.summary.status.clone().unwrap_or_default();
        let timestamp = status.timestamp.map(format_timestamp).unwrap_or_default();
        let percentage = status
            .percentage
            .filter(|percentage| *percentage != 0.0)
            .map(|percentage| format!("{percentage:.2}"))
            .unwrap_or_default();
        let message = status
            .message
            .map(|message| message.replace('\n', " ").chars().take(MESSAGE_WIDTH).collect::<String>())
            .unwrap_or_default();

        vec![
            self.guid.clone(),
            if self.summary.finalized { "Y" } else { "N" }.to_string(),
            timestamp,
            percentage,
            message,
            self.summary.outcome().marker().to_string(),
        ]
    }
}

/// Local wall-clock rendering of a unix timestamp; empty for zero.
pub fn format_timestamp(seconds: f64) -> String {
    if seconds == 0.0 {
        return String::new();
    }
    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    match Local.timestamp_opt(whole, nanos).single() {
        Some(time) => time.format(TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
