//! Boundary to the messaging runtime.
//!
//! The client only needs request/response calls and fire-and-forget topic
//! subscriptions. Connection setup and framing belong to the implementor.

use serde_json::Value;

use crate::error::TransportError;

/// Positional arguments delivered with a published event.
pub type EventArgs = Vec<Value>;

/// Callback invoked by the transport for every event on a subscribed topic.
/// Handlers may run on a transport-owned thread.
pub type EventHandler = Box<dyn Fn(EventArgs) + Send + Sync + 'static>;

pub trait RpcTransport: Send + Sync {
    /// Call a fully qualified procedure and block until it answers.
    fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, TransportError>;

    /// Register `handler` for every event published on `topic`.
    fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), TransportError>;

    /// Close the session. Pending subscriptions stop delivering.
    fn disconnect(&self) -> Result<(), TransportError>;
}

impl<T: RpcTransport + ?Sized> RpcTransport for std::sync::Arc<T> {
    fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        (**self).call(procedure, args)
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), TransportError> {
        (**self).subscribe(topic, handler)
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        (**self).disconnect()
    }
}
