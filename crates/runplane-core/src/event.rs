//! Events carried by an execution channel.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker attached to the engine events that bracket worker start-up.
pub const SUBPROCESS_INIT_MARKER: &str = "subprocess_init";

/// One record on an execution channel.
///
/// The recognized variants are protocol-level and parsed strictly: a record
/// whose `type` names one of them but whose body does not match is an error.
/// Anything else a worker emits (the job's own domain events) is carried
/// verbatim in [`Event::Opaque`] and forwarded without inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The worker loaded its request. Always the first record of a
    /// subprocess channel.
    LoadComplete,

    /// The worker failed outside of job code.
    IpcError {
        message: String,
        error_info: SerializableErrorInfo,
    },

    /// Lifecycle or diagnostic record attached to a run.
    #[serde(rename = "engine_event")]
    Engine(EngineEvent),

    /// The run was moved to FAILURE.
    RunFailure { message: String },

    /// The writer is done; nothing follows.
    StreamEnd,

    /// Any object whose `type` is not one of the above, or that has none.
    #[serde(untagged)]
    Opaque(Value),
}

impl Event {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoadComplete => "load_complete",
            Self::IpcError { .. } => "ipc_error",
            Self::Engine(_) => "engine_event",
            Self::RunFailure { .. } => "run_failure",
            Self::StreamEnd => "stream_end",
            Self::Opaque(_) => "opaque",
        }
    }
}

#[derive(Deserialize)]
struct IpcErrorBody {
    message: String,
    error_info: SerializableErrorInfo,
}

#[derive(Deserialize)]
struct RunFailureBody {
    message: String,
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Some(record) = value.as_object() else {
            return Err(de::Error::custom("event record must be a JSON object"));
        };

        let tag = match record.get("type") {
            None => return Ok(Self::Opaque(value)),
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "event `type` must be a string, got {}",
                    other
                )))
            }
        };

        let parsed = match tag.as_str() {
            "load_complete" => Ok(Self::LoadComplete),
            "stream_end" => Ok(Self::StreamEnd),
            "ipc_error" => IpcErrorBody::deserialize(value).map(|body| Self::IpcError {
                message: body.message,
                error_info: body.error_info,
            }),
            "engine_event" => EngineEvent::deserialize(value).map(Self::Engine),
            "run_failure" => RunFailureBody::deserialize(value)
                .map(|body| Self::RunFailure { message: body.message }),
            _ => Ok(Self::Opaque(value)),
        };

        parsed.map_err(|e| de::Error::custom(format!("invalid `{}` record: {}", tag, e)))
    }
}

/// Engine event payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializableErrorInfo>,
}

impl EngineEvent {
    /// Create an engine event carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_marker_start(mut self, marker: impl Into<String>) -> Self {
        self.marker_start = Some(marker.into());
        self
    }

    pub fn with_marker_end(mut self, marker: impl Into<String>) -> Self {
        self.marker_end = Some(marker.into());
        self
    }

    pub fn with_error(mut self, error: SerializableErrorInfo) -> Self {
        self.error = Some(error);
        self
    }
}

/// An error flattened into plain data so it can cross a process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls_name: Option<String>,
    #[serde(default)]
    pub stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<SerializableErrorInfo>>,
}

impl SerializableErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cls_name: None,
            stack: Vec::new(),
            cause: None,
        }
    }

    /// Capture an error and its `source()` chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut info = Self::new(error.to_string());
        info.cause = error.source().map(|source| Box::new(Self::from_error(source)));
        info
    }
}
