//! Error types for the simulation client.

use std::path::PathBuf;

/// Errors raised by an [`RpcTransport`](crate::transport::RpcTransport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A remote call failed or could not be delivered.
    #[error("call to {procedure} failed: {message}")]
    Call {
        /// Fully qualified procedure name.
        procedure: String,
        /// Details from the transport or remote side.
        message: String,
    },

    /// Registering an event handler failed.
    #[error("subscription to {topic} failed: {message}")]
    Subscribe {
        /// Fully qualified topic name.
        topic: String,
        /// Details from the transport.
        message: String,
    },

    /// The session has been closed.
    #[error("transport disconnected")]
    Disconnected,
}

/// Errors surfaced by the lifecycle, retrieval and unpacking operations.
#[derive(Debug, thiserror::Error)]
pub enum GlotError {
    /// The remote side does not know the simulation.
    #[error("simulation [{guid}] not found")]
    NotFound {
        /// Identifier as supplied by the caller.
        guid: String,
    },

    /// A remote call or subscription failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No completion or failure event arrived within the configured bound.
    #[error("no completion event for [{guid}] after {seconds}s")]
    WaitTimedOut {
        /// Simulation being waited on.
        guid: String,
        /// Configured bound.
        seconds: u64,
    },

    /// The remote side reported the run as failed.
    #[error("simulation [{guid}] failed: {message}")]
    RunFailed {
        /// Simulation that failed.
        guid: String,
        /// Message carried by the failure event.
        message: String,
    },

    /// The remote side refused to cancel a run.
    #[error("could not cancel [{guid}]")]
    CancelRefused {
        /// Simulation that was not cancelled.
        guid: String,
    },

    /// The remote side answered with a shape we cannot interpret.
    #[error("unexpected response from {procedure}: {message}")]
    InvalidResponse {
        /// Procedure suffix that produced the response.
        procedure: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The local endpoint receiving a pushed artifact failed.
    #[error("artifact receiver failed: {0}")]
    Receiver(String),

    /// The diagnostic archive to inspect does not exist.
    #[error("diagnostic archive {} does not exist", path.display())]
    MissingArchive {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Refusing to overwrite an existing directory without `force`.
    #[error("run with --force to remove existing diagnostic directory ({})", path.display())]
    DestinationExists {
        /// Directory that already exists.
        path: PathBuf,
    },

    /// More than one diagnostic file came back and none was chosen.
    #[error("multiple diagnostic files ({count}), run inspect manually")]
    AmbiguousDiagnostic {
        /// Number of files returned by the remote side.
        count: usize,
    },

    /// No scaffold source is configured for the requested mode.
    #[error("unknown scaffold mode: {mode}")]
    UnknownScaffoldMode {
        /// Requested mode.
        mode: String,
    },

    /// Materialising the scaffold directory failed.
    #[error("scaffold clone from {source_location} failed: {message}")]
    Scaffold {
        /// Location the scaffold was cloned from.
        source_location: String,
        /// Details from the cloner.
        message: String,
    },

    /// Two bundle sources flatten to the same archive entry.
    #[error("bundle sources share the base name {name}")]
    DuplicateBaseName {
        /// The colliding base name.
        name: String,
    },

    /// The descriptor lacks an element the launch needs.
    #[error("descriptor has no <{element}> element")]
    InvalidDescriptor {
        /// Missing element name.
        element: &'static str,
    },

    /// The descriptor could not be parsed.
    #[error("failed to parse descriptor: {0}")]
    Xml(#[from] xmltree::ParseError),

    /// The descriptor could not be serialized.
    #[error("failed to serialize descriptor: {0}")]
    XmlWrite(#[from] xmltree::Error),

    /// A local filesystem operation failed.
    #[error("{context} ({}): {source}", path.display())]
    Io {
        /// What was being attempted.
        context: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl GlotError {
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> GlotError {
        let path = path.into();
        move |source| GlotError::Io {
            context,
            path,
            source,
        }
    }
}

pub type Result<T, E = GlotError> = std::result::Result<T, E>;
