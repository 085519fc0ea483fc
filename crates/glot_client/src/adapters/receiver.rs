//! One-shot HTTP endpoint for archives pushed back by the service.
//!
//! Each listen binds a fresh socket on its own single-threaded runtime and
//! serves until one `PUT` or `POST` body has been stored under the expected
//! file name. Other methods get `405` and waiting continues.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode};
use axum::Router;
use glot_core::{ArtifactReceiver, PendingArtifact};
use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct OneShotHttpReceiver {
    host: String,
    port: u16,
    directory: PathBuf,
}

impl OneShotHttpReceiver {
    pub fn new(host: impl Into<String>, port: u16, directory: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            directory: directory.into(),
        }
    }

    /// Bind the listening socket for `filename`.
    pub fn bind(&self, filename: &str) -> io::Result<OneShotUpload> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let listener = runtime.block_on(TcpListener::bind((self.host.as_str(), self.port)))?;
        let path = self.directory.join(filename);
        tracing::info!(
            address = %listener.local_addr()?,
            file = %path.display(),
            "waiting for upload"
        );
        Ok(OneShotUpload {
            runtime,
            listener,
            path,
        })
    }
}

impl ArtifactReceiver for OneShotHttpReceiver {
    fn listen(&self, filename: &str) -> Result<Box<dyn PendingArtifact>, String> {
        self.bind(filename)
            .map(|upload| Box::new(upload) as Box<dyn PendingArtifact>)
            .map_err(|error| format!("failed to bind receiver for {filename}: {error}"))
    }
}

pub struct OneShotUpload {
    runtime: Runtime,
    listener: TcpListener,
    path: PathBuf,
}

#[derive(Clone)]
struct UploadState {
    path: Arc<PathBuf>,
    stored: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl OneShotUpload {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until one upload has been stored.
    pub fn receive(self) -> io::Result<PathBuf> {
        let Self {
            runtime,
            listener,
            path,
        } = self;
        let (stored, upload_done) = oneshot::channel();
        let state = UploadState {
            path: Arc::new(path.clone()),
            stored: Arc::new(Mutex::new(Some(stored))),
        };
        let app = Router::new()
            .fallback(store_upload)
            .layer(DefaultBodyLimit::disable())
            .with_state(state);

        runtime.block_on(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = upload_done.await;
                })
                .await
        })?;
        Ok(path)
    }
}

impl PendingArtifact for OneShotUpload {
    fn wait(self: Box<Self>) -> Result<PathBuf, String> {
        let path = self.path.clone();
        (*self)
            .receive()
            .map_err(|error| format!("failed to receive {}: {error}", path.display()))
    }

    fn cancel(self: Box<Self>) {
        tracing::debug!(file = %self.path.display(), "receiver closed without upload");
    }
}

async fn store_upload(State(state): State<UploadState>, method: Method, body: Bytes) -> StatusCode {
    if method != Method::PUT && method != Method::POST {
        tracing::debug!(%method, "ignored non-upload request");
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    if let Err(error) = tokio::fs::write(state.path.as_ref(), &body).await {
        tracing::warn!(%error, file = %state.path.display(), "upload failed");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    tracing::debug!(bytes = body.len(), file = %state.path.display(), "upload stored");

    let stored = state.stored.lock().ok().and_then(|mut slot| slot.take());
    if let Some(stored) = stored {
        let _ = stored.send(());
    }
    StatusCode::OK
}
