//! Tool-execution lifecycle snapshots.
//!
//! The server reports a tool call's progress as an object whose `status` field is one of
//! `pending`, `running`, `completed` or `error`, each with its own required fields. A
//! [`ToolState`] is a one-shot classification of one such snapshot; it never transitions
//! locally. Snapshots with an unrecognized status, or whose fields do not match the
//! status they claim, decode as [`ToolState::Unknown`] instead of failing.

use crate::decode::{Discriminated, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// The discriminator field for tool states.
pub const STATUS_FIELD: &str = "status";

/// Start and optional end of a tool run, in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTime {
    /// When the tool started.
    pub start: u64,
}

/// Start and end of a finished tool run, in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanTime {
    /// When the tool started.
    pub start: u64,
    /// When the tool finished.
    pub end: u64,
    /// When the output was compacted away, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacted: Option<u64>,
}

/// The tool call has been requested but not started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStatePending {
    /// Arguments as far as they have been streamed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Raw, possibly partial, argument text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Variant for ToolStatePending {
    const TAG: &'static str = "pending";
}

/// The tool is executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStateRunning {
    /// Tool arguments.
    pub input: Value,
    /// Human-readable label for the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tool-specific progress data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Run timing.
    pub time: StartTime,
}

impl Variant for ToolStateRunning {
    const TAG: &'static str = "running";
}

/// The tool finished and produced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStateCompleted {
    /// Tool arguments.
    pub input: Value,
    /// Tool output.
    pub output: String,
    /// Human-readable label for the run.
    pub title: String,
    /// Tool-specific result data.
    pub metadata: Value,
    /// Run timing.
    pub time: SpanTime,
}

impl Variant for ToolStateCompleted {
    const TAG: &'static str = "completed";
}

/// The tool failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStateError {
    /// Tool arguments.
    pub input: Value,
    /// Failure description.
    pub error: String,
    /// Tool-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Run timing.
    pub time: SpanTime,
}

impl Variant for ToolStateError {
    const TAG: &'static str = "error";
}

/// A snapshot of a tool call's lifecycle.
///
/// # Examples
///
/// ```
/// use palaver::ToolState;
///
/// let state: ToolState = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
/// assert!(state.as_pending().is_some());
/// assert!(state.as_running().is_none());
///
/// let state: ToolState = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
/// assert!(state.is_unknown());
/// assert_eq!(state.status(), Some("queued"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ToolState {
    /// `status: "pending"`.
    Pending(ToolStatePending),
    /// `status: "running"`.
    Running(ToolStateRunning),
    /// `status: "completed"`.
    Completed(ToolStateCompleted),
    /// `status: "error"`.
    Error(ToolStateError),
    /// Missing or unrecognized status, or fields that do not fit the claimed status.
    Unknown(Discriminated),
}

impl ToolState {
    /// Classifies a snapshot. Never fails.
    pub fn from_value(raw: Value) -> Self {
        let payload = Discriminated::from_value(STATUS_FIELD, raw);
        let state = match payload.tag() {
            Some(tag) if tag == ToolStatePending::TAG => payload.variant().map(ToolState::Pending),
            Some(tag) if tag == ToolStateRunning::TAG => payload.variant().map(ToolState::Running),
            Some(tag) if tag == ToolStateCompleted::TAG => {
                payload.variant().map(ToolState::Completed)
            }
            Some(tag) if tag == ToolStateError::TAG => payload.variant().map(ToolState::Error),
            _ => None,
        };
        state.unwrap_or(ToolState::Unknown(payload))
    }

    /// The status string as received, if there was one.
    pub fn status(&self) -> Option<&str> {
        match self {
            ToolState::Pending(_) => Some(ToolStatePending::TAG),
            ToolState::Running(_) => Some(ToolStateRunning::TAG),
            ToolState::Completed(_) => Some(ToolStateCompleted::TAG),
            ToolState::Error(_) => Some(ToolStateError::TAG),
            ToolState::Unknown(payload) => payload.tag(),
        }
    }

    /// The pending shape, if this is one.
    pub fn as_pending(&self) -> Option<&ToolStatePending> {
        match self {
            ToolState::Pending(state) => Some(state),
            _ => None,
        }
    }

    /// The running shape, if this is one.
    pub fn as_running(&self) -> Option<&ToolStateRunning> {
        match self {
            ToolState::Running(state) => Some(state),
            _ => None,
        }
    }

    /// The completed shape, if this is one.
    pub fn as_completed(&self) -> Option<&ToolStateCompleted> {
        match self {
            ToolState::Completed(state) => Some(state),
            _ => None,
        }
    }

    /// The error shape, if this is one.
    pub fn as_error(&self) -> Option<&ToolStateError> {
        match self {
            ToolState::Error(state) => Some(state),
            _ => None,
        }
    }

    /// Returns `true` if no known shape matched.
    pub fn is_unknown(&self) -> bool {
        matches!(self, ToolState::Unknown(_))
    }

    /// Returns `true` for `completed` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolState::Completed(_) | ToolState::Error(_))
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        let (tag, mut value) = match self {
            ToolState::Unknown(payload) => return Ok(payload.raw().clone()),
            ToolState::Pending(state) => (ToolStatePending::TAG, serde_json::to_value(state)?),
            ToolState::Running(state) => (ToolStateRunning::TAG, serde_json::to_value(state)?),
            ToolState::Completed(state) => (ToolStateCompleted::TAG, serde_json::to_value(state)?),
            ToolState::Error(state) => (ToolStateError::TAG, serde_json::to_value(state)?),
        };
        if let Value::Object(map) = &mut value {
            map.insert(STATUS_FIELD.to_string(), Value::String(tag.to_string()));
        }
        Ok(value)
    }
}

impl<'de> Deserialize<'de> for ToolState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(ToolState::from_value)
    }
}

/// `Unknown` writes its snapshot back verbatim. Known states write their modeled fields
/// plus `status`; absent optional fields are omitted and unmodeled server fields are not
/// carried over.
impl Serialize for ToolState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.to_value() {
            Ok(value) => value.serialize(serializer),
            Err(e) => Err(<S::Error as serde::ser::Error>::custom(e)),
        }
    }
}
