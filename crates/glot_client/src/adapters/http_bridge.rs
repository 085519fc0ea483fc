//! RPC transport over a router's HTTP bridge.
//!
//! Calls are `POST <base>/call` with `{"procedure", "args"}`; the result is
//! the first element of the reply's `args`. Subscriptions poll
//! `GET <base>/events?topic=<topic>` on a background thread, which answers
//! with a JSON array of argument arrays published since the last poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use glot_core::{EventArgs, EventHandler, RpcTransport, TransportError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    procedure: &'a str,
    args: &'a [Value],
}

#[derive(Debug, Default, Deserialize)]
struct CallReply {
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpBridgeTransport {
    client: Client,
    endpoint: String,
    poll_interval: Duration,
    stopped: Arc<AtomicBool>,
    pollers: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpBridgeTransport {
    /// Create a transport for the bridge at `endpoint` (e.g. `http://localhost:18080`).
    pub fn connect(endpoint: &str, poll_interval: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| TransportError::Call {
                procedure: "connect".to_string(),
                message: format!("failed to build HTTP client: {error}"),
            })?;
        tracing::debug!(endpoint, "connected to router bridge");
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            poll_interval,
            stopped: Arc::new(AtomicBool::new(false)),
            pollers: Mutex::new(Vec::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn ensure_open(&self, procedure: &str) -> Result<(), TransportError> {
        if self.stopped.load(Ordering::SeqCst) {
            tracing::debug!(procedure, "transport already closed");
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }
}

impl RpcTransport for HttpBridgeTransport {
    fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        self.ensure_open(procedure)?;
        let call_error = |message: String| TransportError::Call {
            procedure: procedure.to_string(),
            message,
        };

        let response = self
            .client
            .post(format!("{}/call", self.endpoint))
            .json(&CallRequest {
                procedure,
                args: &args,
            })
            .send()
            .map_err(|error| call_error(format!("request failed: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(call_error(format!("router answered {status}")));
        }
        let reply: CallReply = response
            .json()
            .map_err(|error| call_error(format!("invalid reply: {error}")))?;
        if let Some(message) = reply.error {
            return Err(call_error(message));
        }
        Ok(reply.args.into_iter().next().unwrap_or(Value::Null))
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), TransportError> {
        self.ensure_open(topic)?;
        let poller = EventPoller {
            client: self.client.clone(),
            url: format!("{}/events", self.endpoint),
            topic: topic.to_string(),
            interval: self.poll_interval,
            stopped: Arc::clone(&self.stopped),
        };
        let handle = thread::Builder::new()
            .name(format!("glot-events-{topic}"))
            .spawn(move || poller.run(handler))
            .map_err(|error| TransportError::Subscribe {
                topic: topic.to_string(),
                message: error.to_string(),
            })?;
        self.pollers
            .lock()
            .map_err(|_| TransportError::Subscribe {
                topic: topic.to_string(),
                message: "poller registry poisoned".to_string(),
            })?
            .push(handle);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.stopped.store(true, Ordering::SeqCst);
        let handles = match self.pollers.lock() {
            Ok(mut pollers) => std::mem::take(&mut *pollers),
            Err(_) => Vec::new(),
        };
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        tracing::debug!(endpoint = %self.endpoint, "disconnected");
        Ok(())
    }
}

impl Drop for HttpBridgeTransport {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct EventPoller {
    client: Client,
    url: String,
    topic: String,
    interval: Duration,
    stopped: Arc<AtomicBool>,
}

impl EventPoller {
    fn run(self, handler: EventHandler) {
        while !self.stopped.load(Ordering::SeqCst) {
            match self.poll() {
                Ok(events) => {
                    for args in events {
                        handler(args);
                    }
                }
                Err(message) => tracing::warn!(topic = %self.topic, %message, "event poll failed"),
            }
            thread::sleep(self.interval);
        }
    }

    fn poll(&self) -> Result<Vec<EventArgs>, String> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("topic", self.topic.as_str())])
            .send()
            .map_err(|error| error.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("router answered {status}"));
        }
        let events: Option<Vec<EventArgs>> = response.json().map_err(|error| error.to_string())?;
        Ok(events.unwrap_or_default())
    }
}
