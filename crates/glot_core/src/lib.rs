//! Client-side protocol for driving a remote simulation service.
//!
//! This crate owns the simulation lifecycle: bundling local files for the
//! remote staging area, rewriting the simulation descriptor, issuing the
//! ordered launch sequence, waiting for completion events, querying results,
//! and unpacking diagnostic archives onto a scaffold directory. It
//! intentionally excludes network transports, HTTP servers and process
//! spawning; those live behind the traits in [`transport`], [`retrieval`] and
//! [`scaffold`] and are implemented in `glot_client`.

pub mod bundle;
pub mod contract;
pub mod descriptor;
pub mod diagnostic;
pub mod error;
pub mod lifecycle;
pub mod retrieval;
pub mod scaffold;
pub mod service;
pub mod table;
pub mod transport;

pub use bundle::{Bundle, FileBundler};
pub use contract::{EventTopic, Procedure, ProcedureNamespace, STAGING_ROOT};
pub use descriptor::SimulationDescriptor;
pub use diagnostic::DiagnosticUnpacker;
pub use error::{GlotError, TransportError};
pub use lifecycle::{LaunchRequest, LifecycleOrchestrator, RunningSimulation, SimulationOutcome};
pub use retrieval::{ArtifactReceiver, PendingArtifact, ResultsRetriever, RetrievalOptions, SearchQuery, SortKey};
pub use scaffold::{ScaffoldCloner, ScaffoldSpec, ScaffoldTable};
pub use service::SimulationService;
pub use table::Table;
pub use transport::{EventArgs, EventHandler, RpcTransport};
