use std::collections::HashMap;
use std::sync::Mutex;

use glot_core::{EventArgs, EventHandler, RpcTransport, TransportError};
use serde_json::Value;

/// In-memory transport that records every call and replays scripted replies.
pub struct RecordingTransport {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    replies: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, String>>,
    handlers: Mutex<Vec<(String, EventHandler)>>,
    disconnects: Mutex<usize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            handlers: Mutex::new(Vec::new()),
            disconnects: Mutex::new(0),
        }
    }

    /// Reply with `value` whenever `procedure` is called.
    pub fn reply(&self, procedure: &str, value: Value) {
        self.replies
            .lock()
            .expect("poisoned mutex")
            .insert(procedure.to_string(), value);
    }

    /// Fail every call to `procedure`.
    pub fn fail(&self, procedure: &str, message: &str) {
        self.failures
            .lock()
            .expect("poisoned mutex")
            .insert(procedure.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn procedures(&self) -> Vec<String> {
        self.calls().into_iter().map(|(procedure, _)| procedure).collect()
    }

    pub fn args_of(&self, procedure: &str) -> Option<Vec<Value>> {
        self.calls()
            .into_iter()
            .find(|(name, _)| name == procedure)
            .map(|(_, args)| args)
    }

    pub fn topics(&self) -> Vec<String> {
        self.handlers
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().expect("poisoned mutex")
    }

    /// Deliver an event to every handler registered for `topic`.
    pub fn publish(&self, topic: &str, args: EventArgs) {
        let handlers = self.handlers.lock().expect("poisoned mutex");
        for (registered, handler) in handlers.iter() {
            if registered == topic {
                handler(args.clone());
            }
        }
    }
}

impl RpcTransport for RecordingTransport {
    fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push((procedure.to_string(), args));
        if let Some(message) = self.failures.lock().expect("poisoned mutex").get(procedure) {
            return Err(TransportError::Call {
                procedure: procedure.to_string(),
                message: message.clone(),
            });
        }
        Ok(self
            .replies
            .lock()
            .expect("poisoned mutex")
            .get(procedure)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), TransportError> {
        self.handlers
            .lock()
            .expect("poisoned mutex")
            .push((topic.to_string(), handler));
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        *self.disconnects.lock().expect("poisoned mutex") += 1;
        Ok(())
    }
}
