use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GlotError;

/// Fixed path on the remote execution host where bundles and requested
/// output files are staged.
pub const STAGING_ROOT: &str = "/tmp/gssa-transferrer";
pub const PROCEDURE_PREFIX: &str = "com.gosmartsimulation";

/// Remote path under the staging root for a file of the given base name.
pub fn staged_path(basename: &str) -> String {
    format!("{STAGING_ROOT}/{}", basename.trim_start_matches('/'))
}

/// Remote procedures the client is allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    Init,
    UpdateSettingsXml,
    Finalize,
    Start,
    Cancel,
    Clean,
    RetrieveStatus,
    Search,
    RequestResults,
    RequestDiagnostic,
    RequestFiles,
}

impl Procedure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::UpdateSettingsXml => "update_settings_xml",
            Self::Finalize => "finalize",
            Self::Start => "start",
            Self::Cancel => "cancel",
            Self::Clean => "clean",
            Self::RetrieveStatus => "retrieve_status",
            Self::Search => "search",
            Self::RequestResults => "request_results",
            Self::RequestDiagnostic => "request_diagnostic",
            Self::RequestFiles => "request_files",
        }
    }
}

/// Topics published by the remote side when a run terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    Complete,
    Fail,
}

impl EventTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Fail => "fail",
        }
    }
}

/// Maps procedure and topic suffixes onto fully qualified names, optionally
/// addressing one specific server instead of whichever holds the namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcedureNamespace {
    server: Option<String>,
}

impl ProcedureNamespace {
    pub fn new(server: Option<String>) -> Self {
        Self {
            server: server.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn procedure(&self, procedure: Procedure) -> String {
        self.qualify(procedure.as_str())
    }

    pub fn topic(&self, topic: EventTopic) -> String {
        self.qualify(topic.as_str())
    }

    fn qualify(&self, suffix: &str) -> String {
        match &self.server {
            Some(server) => format!("{PROCEDURE_PREFIX}.{server}.{suffix}"),
            None => format!("{PROCEDURE_PREFIX}.{suffix}"),
        }
    }
}

/// Progress record of a simulation as reported by `retrieve_status` and
/// `search`. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    #[serde(default, deserialize_with = "lenient_number")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub timestamp: Option<f64>,
}

/// One entry of the `search` response.
///
/// Flags follow the remote side's loose conventions: any falsy value
/// (`null`, `0`, empty) reads as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<SimulationStatus>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub finalized: bool,
    #[serde(default, deserialize_with = "lenient_exit_status")]
    pub exit_status: Option<Vec<Value>>,
}

/// Terminal outcome recorded in `exit_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Pending,
    Succeeded,
    Failed,
}

impl ExitOutcome {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Pending => "-",
            Self::Succeeded => "Y",
            Self::Failed => "N",
        }
    }
}

impl SimulationSummary {
    pub fn outcome(&self) -> ExitOutcome {
        match self.exit_status.as_deref() {
            None | Some([]) => ExitOutcome::Pending,
            Some([first, ..]) => match first {
                Value::Bool(true) => ExitOutcome::Succeeded,
                Value::String(token) if token == "SUCCESS" => ExitOutcome::Succeeded,
                _ => ExitOutcome::Failed,
            },
        }
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.status.as_ref().and_then(|status| status.timestamp)
    }
}

/// Truthiness of a loosely typed remote value.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Null => false,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// Non-numeric percentages show up while a run is being set up; they render
// as absent rather than failing the whole row.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(truthy).unwrap_or(false))
}

// A falsy status means "nothing reported yet".
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<SimulationStatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) if truthy(&value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(value) if truthy(&value) => Err(serde::de::Error::custom(format!(
            "status must be an object, got {value}"
        ))),
        _ => Ok(None),
    }
}

// A bare flag is read as a one-element exit status.
fn lenient_exit_status<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value) if !truthy(&value) => None,
        Some(Value::Array(items)) => Some(items),
        Some(other) => Some(vec![other]),
        None => None,
    })
}

/// Arguments of a `complete` event.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteEvent {
    pub guid: String,
    pub success: Value,
    pub directory: Option<String>,
    pub time: Option<f64>,
    pub validation: Option<Value>,
}

/// Arguments of a `fail` event.
#[derive(Debug, Clone, PartialEq)]
pub struct FailEvent {
    pub guid: String,
    pub message: String,
    pub directory: Option<String>,
    pub time: Option<f64>,
    pub validation: Option<Value>,
}

impl CompleteEvent {
    pub fn from_args(args: &[Value]) -> Result<Self, GlotError> {
        Ok(Self {
            guid: event_guid(args, EventTopic::Complete)?,
            success: args.get(1).cloned().unwrap_or(Value::Null),
            directory: optional_string(args.get(2)),
            time: args.get(3).and_then(Value::as_f64),
            validation: non_null(args.get(4)),
        })
    }
}

impl FailEvent {
    pub fn from_args(args: &[Value]) -> Result<Self, GlotError> {
        let message = match args.get(1) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Ok(Self {
            guid: event_guid(args, EventTopic::Fail)?,
            message,
            directory: optional_string(args.get(2)),
            time: args.get(3).and_then(Value::as_f64),
            validation: non_null(args.get(4)),
        })
    }
}

fn event_guid(args: &[Value], topic: EventTopic) -> Result<String, GlotError> {
    args.first()
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GlotError::InvalidResponse {
            procedure: topic.as_str(),
            message: "event must carry the simulation guid as its first argument".to_string(),
        })
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|value| !value.is_null()).cloned()
}
