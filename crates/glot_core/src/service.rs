//! Typed call surface over an [`RpcTransport`].

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::contract::{truthy, EventTopic, Procedure, ProcedureNamespace};
use crate::error::{GlotError, Result, TransportError};
use crate::transport::{EventArgs, RpcTransport};

/// Identifiers are matched case-insensitively by the remote side; queries
/// always send the upper-cased form.
pub fn query_guid(guid: &str) -> String {
    guid.trim().to_uppercase()
}

/// One method per remote procedure, each building the positional arguments
/// the service expects and decoding its reply.
#[derive(Clone)]
pub struct SimulationService {
    transport: Arc<dyn RpcTransport>,
    namespace: ProcedureNamespace,
    subscriptions: Arc<Mutex<HashSet<(EventTopic, String)>>>,
}

impl SimulationService {
    pub fn new(transport: Arc<dyn RpcTransport>, namespace: ProcedureNamespace) -> Self {
        Self {
            transport,
            namespace,
            subscriptions: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn namespace(&self) -> &ProcedureNamespace {
        &self.namespace
    }

    pub fn init(&self, guid: &str) -> Result<()> {
        self.call(Procedure::Init, vec![json!(guid)]).map(drop)
    }

    pub fn update_settings_xml(&self, guid: &str, descriptor_xml: &str) -> Result<()> {
        self.call(
            Procedure::UpdateSettingsXml,
            vec![json!(guid), json!(descriptor_xml)],
        )
        .map(drop)
    }

    pub fn finalize(&self, guid: &str, subdirectory: &str) -> Result<()> {
        self.call(Procedure::Finalize, vec![json!(guid), json!(subdirectory)])
            .map(drop)
    }

    pub fn start(&self, guid: &str) -> Result<()> {
        self.call(Procedure::Start, vec![json!(guid)]).map(drop)
    }

    pub fn clean(&self, guid: &str) -> Result<()> {
        self.call(Procedure::Clean, vec![json!(guid)]).map(drop)
    }

    pub fn cancel(&self, guid: &str) -> Result<bool> {
        let reply = self.call(Procedure::Cancel, vec![json!(query_guid(guid))])?;
        Ok(truthy(&reply))
    }

    /// Status map for one simulation, `None` when the remote side has nothing.
    pub fn retrieve_status(&self, guid: &str) -> Result<Option<Map<String, Value>>> {
        let reply = self.call(Procedure::RetrieveStatus, vec![json!(query_guid(guid))])?;
        match reply {
            Value::Object(map) if !map.is_empty() => Ok(Some(map)),
            Value::Object(_) | Value::Null | Value::Bool(false) => Ok(None),
            other => Err(unexpected(Procedure::RetrieveStatus, "an object", &other)),
        }
    }

    /// Raw guid → summary mapping; entries are decoded one by one by the
    /// caller so a single malformed entry does not poison the rest.
    pub fn search(&self, guid: Option<&str>, server_limit: Option<u32>) -> Result<Map<String, Value>> {
        let filter = guid.map(query_guid).unwrap_or_default();
        let reply = self.call(Procedure::Search, vec![json!(filter), json!(server_limit)])?;
        match reply {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(unexpected(Procedure::Search, "an object", &other)),
        }
    }

    pub fn request_results(&self, guid: &str, target: Option<&str>) -> Result<bool> {
        let reply = self.call(
            Procedure::RequestResults,
            vec![json!(query_guid(guid)), json!(target)],
        )?;
        Ok(truthy(&reply))
    }

    /// File name → path of the diagnostic archives the remote side produced.
    pub fn request_diagnostic(
        &self,
        guid: &str,
        target: Option<&str>,
    ) -> Result<BTreeMap<String, String>> {
        let reply = self.call(
            Procedure::RequestDiagnostic,
            vec![json!(query_guid(guid)), json!(target)],
        )?;
        string_map(Procedure::RequestDiagnostic, reply)
    }

    pub fn request_files(&self, guid: &str, files: &BTreeMap<String, String>) -> Result<Value> {
        self.call(Procedure::RequestFiles, vec![json!(guid), json!(files)])
    }

    /// Deliver events on `topic` that belong to `guid` to `handler`.
    ///
    /// A second registration for the same topic and guid is rejected.
    pub fn subscribe<F>(&self, topic: EventTopic, guid: &str, handler: F) -> Result<()>
    where
        F: Fn(EventArgs) + Send + Sync + 'static,
    {
        let topic_name = self.namespace.topic(topic);
        let key = (topic, query_guid(guid));
        {
            let mut registered = self
                .subscriptions
                .lock()
                .map_err(|_| subscribe_error(&topic_name, "subscription registry poisoned"))?;
            if !registered.insert(key.clone()) {
                return Err(subscribe_error(&topic_name, "handler already registered for guid").into());
            }
        }

        let wanted = key.1;
        let filtered = move |args: EventArgs| {
            let matches = args
                .first()
                .and_then(Value::as_str)
                .map(|event_guid| query_guid(event_guid) == wanted)
                .unwrap_or(false);
            if matches {
                handler(args);
            }
        };

        tracing::debug!(topic = %topic_name, guid, "subscribing");
        self.transport
            .subscribe(&topic_name, Box::new(filtered))
            .map_err(GlotError::from)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.transport.disconnect().map_err(GlotError::from)
    }

    fn call(&self, procedure: Procedure, args: Vec<Value>) -> Result<Value> {
        let name = self.namespace.procedure(procedure);
        tracing::debug!(procedure = %name, "calling");
        self.transport.call(&name, args).map_err(GlotError::from)
    }
}

fn string_map(procedure: Procedure, reply: Value) -> Result<BTreeMap<String, String>> {
    match reply {
        Value::Null | Value::Bool(false) => Ok(BTreeMap::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(name, path)| match path {
                Value::String(path) => Ok((name, path)),
                other => Err(unexpected(procedure, "string paths", &other)),
            })
            .collect(),
        other => Err(unexpected(procedure, "an object", &other)),
    }
}

fn unexpected(procedure: Procedure, expected: &str, got: &Value) -> GlotError {
    GlotError::InvalidResponse {
        procedure: procedure.as_str(),
        message: format!("expected {expected}, got {got}"),
    }
}

fn subscribe_error(topic: &str, message: &str) -> TransportError {
    TransportError::Subscribe {
        topic: topic.to_string(),
        message: message.to_string(),
    }
}
