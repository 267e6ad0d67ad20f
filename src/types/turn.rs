//! Turn state: one request/response exchange with the model service.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Service-assigned turn identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    Created,
    Queued,
    InProgress,
    Completed,
    Failed,
    Incomplete,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Incomplete)
    }
}

/// The packaged result of one tool call, sent back as continuation input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "function_call_output")]
pub struct FunctionCallOutput {
    pub call_id: String,
    pub output: String,
}

/// Input submitted to start a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnInput {
    /// Free-form user text.
    Text(String),
    /// Results for the tool calls of the previous turn.
    ToolOutputs(Vec<FunctionCallOutput>),
}

impl TurnInput {
    pub fn is_continuation(&self) -> bool {
        matches!(self, Self::ToolOutputs(_))
    }
}

/// A finished tool call with decoded arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    /// Raw argument text as streamed, for trace output.
    pub raw_arguments: String,
}

/// Accumulation buffer for an output item while its events stream in.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputItemState {
    Message {
        id: String,
        text: String,
        done: bool,
    },
    ToolCall {
        id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
        done: bool,
    },
    Other {
        kind: &'static str,
        id: Option<String>,
    },
}

/// Dispatcher-side view of one turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: Option<TurnId>,
    pub state: TurnState,
    /// Items keyed by their position in the turn's output.
    pub items: BTreeMap<u32, OutputItemState>,
    pub last_sequence: Option<u64>,
    /// Events seen with a sequence number lower than their predecessor.
    pub out_of_order: u32,
    /// Failure or incompleteness reason reported by the service.
    pub reason: Option<String>,
}

impl Default for Turn {
    fn default() -> Self {
        Self {
            id: None,
            state: TurnState::Created,
            items: BTreeMap::new(),
            last_sequence: None,
            out_of_order: 0,
            reason: None,
        }
    }
}

impl Turn {
    /// Final text of every message item, in output order.
    pub fn message_text(&self) -> String {
        self.items
            .values()
            .filter_map(|item| match item {
                OutputItemState::Message { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
