//! Launching, waiting on, finalizing and cancelling a simulation.
//!
//! A launch is a fixed sequence of four blocking calls: `init`,
//! `update_settings_xml`, `finalize`, `start`. Each one must have returned
//! before the next is issued because the remote side builds on the previous
//! step. Nothing is rolled back when a later step fails.
//!
//! After `start` the orchestrator subscribes to the `complete` and `fail`
//! topics for the new guid. Events are forwarded over a channel to
//! [`RunningSimulation::wait`]. Unless a wait bound is configured, waiting
//! blocks for as long as the remote side stays silent.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::bundle::{FileBundler, StagedBundle};
use crate::contract::{staged_path, CompleteEvent, EventTopic, FailEvent};
use crate::descriptor::SimulationDescriptor;
use crate::error::{GlotError, Result, TransportError};
use crate::service::SimulationService;
use crate::transport::EventArgs;

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub descriptor: SimulationDescriptor,
    /// Working subdirectory on the remote side, passed to `finalize`.
    pub subdirectory: String,
    pub input_files: Vec<PathBuf>,
    pub definition_files: Vec<PathBuf>,
    pub skip_clean: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Completed {
        guid: String,
        success: Value,
        directory: Option<String>,
        /// Reply to `request_files`, absent when that call failed.
        files: Option<Value>,
        cleaned: bool,
    },
    Failed {
        guid: String,
        message: String,
        cleaned: bool,
    },
}

#[derive(Debug)]
enum SimulationEvent {
    Complete(CompleteEvent),
    Fail(FailEvent),
}

pub struct LifecycleOrchestrator {
    service: SimulationService,
    bundler: FileBundler,
    output_files: Vec<String>,
    wait_timeout: Option<Duration>,
}

impl LifecycleOrchestrator {
    pub fn new(service: SimulationService, bundler: FileBundler) -> Self {
        Self {
            service,
            bundler,
            output_files: Vec::new(),
            wait_timeout: None,
        }
    }

    /// Files to fetch from the staging root once the run completes.
    pub fn with_output_files(mut self, output_files: Vec<String>) -> Self {
        self.output_files = output_files;
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Option<Duration>) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn service(&self) -> &SimulationService {
        &self.service
    }

    /// Bundle local files, send the descriptor and start the run.
    ///
    /// # Errors
    ///
    /// Any bundling or call failure aborts the sequence and is returned as
    /// is. Calls already made are not undone. Local bundles are removed on
    /// every path.
    pub fn launch(&self, request: LaunchRequest) -> Result<RunningSimulation> {
        let LaunchRequest {
            mut descriptor,
            subdirectory,
            input_files,
            definition_files,
            skip_clean,
        } = request;
        let guid = Uuid::now_v7().to_string();

        let mut staged: Vec<StagedBundle> = Vec::new();
        if !definition_files.is_empty() {
            let bundle = self.bundler.bundle(&definition_files)?;
            descriptor.set_definition_location(&bundle.remote_location)?;
            staged.push(bundle.into());
        }
        if !input_files.is_empty() {
            let bundle = self.bundler.bundle(&input_files)?;
            descriptor.add_input_location(&bundle.remote_location)?;
            staged.push(bundle.into());
        }
        let descriptor_xml = descriptor.to_xml_string()?;

        self.service.init(&guid)?;
        tracing::info!(guid = %guid, "initiated");
        self.service.update_settings_xml(&guid, &descriptor_xml)?;
        tracing::info!(guid = %guid, "sent XML");
        self.service.finalize(&guid, &subdirectory)?;
        tracing::info!(guid = %guid, "finalized settings");
        self.service.start(&guid)?;
        tracing::info!(guid = %guid, "started");
        drop(staged);

        let (sender, events) = mpsc::channel();
        self.subscribe(&guid, EventTopic::Complete, sender.clone())?;
        self.subscribe(&guid, EventTopic::Fail, sender)?;

        Ok(RunningSimulation {
            guid,
            service: self.service.clone(),
            events,
            skip_clean,
            output_files: self.output_files.clone(),
            wait_timeout: self.wait_timeout,
        })
    }

    /// Ask the remote side to cancel a run. Returns whether it agreed.
    pub fn cancel(&self, guid: &str) -> Result<bool> {
        let cancelled = self.service.cancel(guid)?;
        if cancelled {
            tracing::info!("cancelled [{guid}]");
        } else {
            tracing::error!("could not cancel [{guid}]");
        }
        Ok(cancelled)
    }

    fn subscribe(&self, guid: &str, topic: EventTopic, sender: Sender<SimulationEvent>) -> Result<()> {
        let sender = Mutex::new(sender);
        self.service.subscribe(topic, guid, move |args: EventArgs| {
            let event = match topic {
                EventTopic::Complete => CompleteEvent::from_args(&args).map(SimulationEvent::Complete),
                EventTopic::Fail => FailEvent::from_args(&args).map(SimulationEvent::Fail),
            };
            match event {
                Ok(event) => {
                    if let Ok(sender) = sender.lock() {
                        let _ = sender.send(event);
                    }
                }
                Err(error) => tracing::warn!(%error, "ignoring malformed event"),
            }
        })
    }
}

/// A started simulation waiting for its terminal event.
pub struct RunningSimulation {
    guid: String,
    service: SimulationService,
    events: Receiver<SimulationEvent>,
    skip_clean: bool,
    output_files: Vec<String>,
    wait_timeout: Option<Duration>,
}

impl RunningSimulation {
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Block until the run completes or fails, then finalize it.
    pub fn wait(self) -> Result<SimulationOutcome> {
        let event = match self.wait_timeout {
            Some(bound) => self.events.recv_timeout(bound).map_err(|error| match error {
                RecvTimeoutError::Timeout => GlotError::WaitTimedOut {
                    guid: self.guid.clone(),
                    seconds: bound.as_secs(),
                },
                RecvTimeoutError::Disconnected => TransportError::Disconnected.into(),
            })?,
            None => self
                .events
                .recv()
                .map_err(|_| GlotError::from(TransportError::Disconnected))?,
        };

        Ok(match event {
            SimulationEvent::Complete(event) => self.on_complete(event),
            SimulationEvent::Fail(event) => self.on_fail(event),
        })
    }

    fn on_complete(&self, event: CompleteEvent) -> SimulationOutcome {
        tracing::info!(guid = %self.guid, "complete");
        if let Some(validation) = &event.validation {
            tracing::info!(guid = %self.guid, %validation, "validation");
        }

        tracing::debug!(guid = %self.guid, "requesting files");
        let requested: BTreeMap<String, String> = self
            .output_files
            .iter()
            .map(|name| (name.clone(), staged_path(name)))
            .collect();
        let files = match self.service.request_files(&self.guid, &requested) {
            Ok(files) => {
                tracing::debug!(guid = %self.guid, %files, "retrieved files");
                Some(files)
            }
            Err(error) => {
                tracing::error!(guid = %self.guid, %error, "could not request files");
                None
            }
        };

        let cleaned = self.finalize();
        SimulationOutcome::Completed {
            guid: self.guid.clone(),
            success: event.success,
            directory: event.directory,
            files,
            cleaned,
        }
    }

    fn on_fail(&self, event: FailEvent) -> SimulationOutcome {
        tracing::warn!(guid = %self.guid, "failed - {}", event.message);
        let cleaned = self.finalize();
        SimulationOutcome::Failed {
            guid: self.guid.clone(),
            message: event.message,
            cleaned,
        }
    }

    // Errors here are logged only; the run has already terminated.
    fn finalize(&self) -> bool {
        if self.skip_clean {
            tracing::info!(guid = %self.guid, "skipping clean-up");
            return false;
        }

        if let Err(error) = self.service.clean(&self.guid) {
            tracing::error!(guid = %self.guid, %error, "clean failed");
            return false;
        }
        if let Err(error) = self.service.disconnect() {
            tracing::warn!(%error, "disconnect failed");
        }
        true
    }
}
