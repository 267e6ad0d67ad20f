//! Stream events emitted by the model service during a turn.
//!
//! Every event kind the service is documented to send is listed here as its
//! own variant, so classification in the dispatcher is an exhaustive `match`
//! with no catch-all. Kind strings outside this list fail decoding with
//! [`ProtocolError::UnrecognizedEventKind`].

use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::item::OutputItem;
use crate::error::ProtocolError;

/// Events carry a monotonically non-decreasing sequence number within a turn.
pub trait Sequenced {
    fn sequence_number(&self) -> u64;
}

macro_rules! sequenced {
    ($($payload:ty),* $(,)?) => {
        $(impl Sequenced for $payload {
            fn sequence_number(&self) -> u64 {
                self.sequence_number
            }
        })*
    };
}

macro_rules! stream_events {
    ($($wire:literal => $variant:ident($payload:ty)),* $(,)?) => {
        /// Discriminant of a [`StreamEvent`], with its wire name.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
        )]
        pub enum EventKind {
            $(#[strum(serialize = $wire)] $variant,)*
        }

        /// One decoded server-sent event.
        #[derive(Debug, Clone, Deserialize)]
        #[serde(tag = "type")]
        pub enum StreamEvent {
            $(#[serde(rename = $wire)] $variant($payload),)*
        }

        impl StreamEvent {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Self::$variant(_) => EventKind::$variant,)*
                }
            }

            pub fn sequence_number(&self) -> u64 {
                match self {
                    $(Self::$variant(payload) => payload.sequence_number(),)*
                }
            }
        }
    };
}

stream_events! {
    "response.created" => Created(ResponseEvent),
    "response.queued" => Queued(ResponseEvent),
    "response.in_progress" => InProgress(ResponseEvent),
    "response.completed" => Completed(ResponseEvent),
    "response.failed" => Failed(ResponseEvent),
    "response.incomplete" => Incomplete(ResponseEvent),
    "error" => Error(ErrorEvent),

    "response.output_item.added" => OutputItemAdded(OutputItemEvent),
    "response.output_item.done" => OutputItemDone(OutputItemEvent),
    "response.content_part.added" => ContentPartAdded(ContentPartEvent),
    "response.content_part.done" => ContentPartDone(ContentPartEvent),

    "response.output_text.delta" => OutputTextDelta(TextDeltaEvent),
    "response.output_text.done" => OutputTextDone(TextDoneEvent),
    "response.output_text.annotation.added" => OutputTextAnnotationAdded(OpaqueEvent),
    "response.refusal.delta" => RefusalDelta(OpaqueEvent),
    "response.refusal.done" => RefusalDone(OpaqueEvent),

    "response.function_call_arguments.delta" => FunctionCallArgumentsDelta(ArgumentsDeltaEvent),
    "response.function_call_arguments.done" => FunctionCallArgumentsDone(ArgumentsDoneEvent),

    "response.web_search_call.in_progress" => WebSearchCallInProgress(ToolProgressEvent),
    "response.web_search_call.searching" => WebSearchCallSearching(ToolProgressEvent),
    "response.web_search_call.completed" => WebSearchCallCompleted(ToolProgressEvent),

    "response.file_search_call.in_progress" => FileSearchCallInProgress(OpaqueEvent),
    "response.file_search_call.searching" => FileSearchCallSearching(OpaqueEvent),
    "response.file_search_call.completed" => FileSearchCallCompleted(OpaqueEvent),

    "response.code_interpreter_call_code.delta" => CodeInterpreterCallCodeDelta(OpaqueEvent),
    "response.code_interpreter_call_code.done" => CodeInterpreterCallCodeDone(OpaqueEvent),
    "response.code_interpreter_call.in_progress" => CodeInterpreterCallInProgress(OpaqueEvent),
    "response.code_interpreter_call.interpreting" => CodeInterpreterCallInterpreting(OpaqueEvent),
    "response.code_interpreter_call.completed" => CodeInterpreterCallCompleted(OpaqueEvent),

    "response.image_generation_call.in_progress" => ImageGenerationCallInProgress(OpaqueEvent),
    "response.image_generation_call.generating" => ImageGenerationCallGenerating(OpaqueEvent),
    "response.image_generation_call.partial_image" => ImageGenerationCallPartialImage(OpaqueEvent),
    "response.image_generation_call.completed" => ImageGenerationCallCompleted(OpaqueEvent),

    "response.audio.delta" => AudioDelta(OpaqueEvent),
    "response.audio.done" => AudioDone(OpaqueEvent),
    "response.audio.transcript.delta" => AudioTranscriptDelta(OpaqueEvent),
    "response.audio.transcript.done" => AudioTranscriptDone(OpaqueEvent),

    "response.reasoning.delta" => ReasoningDelta(OpaqueEvent),
    "response.reasoning.done" => ReasoningDone(OpaqueEvent),
    "response.reasoning_summary.delta" => ReasoningSummaryDelta(OpaqueEvent),
    "response.reasoning_summary.done" => ReasoningSummaryDone(OpaqueEvent),
    "response.reasoning_summary_part.added" => ReasoningSummaryPartAdded(OpaqueEvent),
    "response.reasoning_summary_part.done" => ReasoningSummaryPartDone(OpaqueEvent),
    "response.reasoning_summary_text.delta" => ReasoningSummaryTextDelta(OpaqueEvent),
    "response.reasoning_summary_text.done" => ReasoningSummaryTextDone(OpaqueEvent),

    "response.mcp_call_arguments.delta" => McpCallArgumentsDelta(OpaqueEvent),
    "response.mcp_call_arguments.done" => McpCallArgumentsDone(OpaqueEvent),
    "response.mcp_call.in_progress" => McpCallInProgress(OpaqueEvent),
    "response.mcp_call.completed" => McpCallCompleted(OpaqueEvent),
    "response.mcp_call.failed" => McpCallFailed(OpaqueEvent),
    "response.mcp_list_tools.in_progress" => McpListToolsInProgress(OpaqueEvent),
    "response.mcp_list_tools.completed" => McpListToolsCompleted(OpaqueEvent),
    "response.mcp_list_tools.failed" => McpListToolsFailed(OpaqueEvent),
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl StreamEvent {
    /// Decode one SSE `data:` payload.
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(data).map_err(|err| ProtocolError::MalformedEvent {
                kind: "<unparsed>".into(),
                message: err.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Decode an event object, distinguishing unknown kinds from malformed ones.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_owned(),
            None => {
                return Err(ProtocolError::MalformedEvent {
                    kind: "<missing>".into(),
                    message: "event has no string `type` field".into(),
                })
            }
        };
        if EventKind::from_str(&kind).is_err() {
            return Err(ProtocolError::UnrecognizedEventKind { kind });
        }
        serde_json::from_value(value)
            .map_err(|err| ProtocolError::MalformedEvent { kind, message: err.to_string() })
    }
}

/// Turn-level lifecycle event carrying the response object.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub response: ResponseObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseObject {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<ResponseErrorDetail>,
    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    pub sequence_number: u64,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputItemEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub output_index: u32,
    pub item: OutputItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPartEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub item_id: String,
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    #[serde(default)]
    pub part: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDeltaEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub item_id: String,
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub delta: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDoneEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub item_id: String,
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentsDeltaEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub item_id: String,
    pub output_index: u32,
    pub delta: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentsDoneEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub item_id: String,
    pub output_index: u32,
    pub arguments: String,
}

/// Progress notification for a hosted tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolProgressEvent {
    #[serde(default)]
    pub sequence_number: u64,
    pub item_id: String,
    pub output_index: u32,
}

/// Payload of a kind this client recognizes but does not act on.
#[derive(Debug, Clone, Deserialize)]
pub struct OpaqueEvent {
    #[serde(default)]
    pub sequence_number: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

sequenced!(
    ResponseEvent,
    ErrorEvent,
    OutputItemEvent,
    ContentPartEvent,
    TextDeltaEvent,
    TextDoneEvent,
    ArgumentsDeltaEvent,
    ArgumentsDoneEvent,
    ToolProgressEvent,
    OpaqueEvent,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn every_kind_round_trips_through_its_wire_name() {
        for kind in EventKind::iter() {
            assert_eq!(EventKind::from_str(kind.as_str()).ok(), Some(kind));
        }
        assert_eq!(EventKind::iter().count(), 53);
    }

    #[test]
    fn decodes_text_delta() {
        let event = StreamEvent::parse(
            r#"{"type":"response.output_text.delta","sequence_number":4,"item_id":"msg_1","output_index":0,"content_index":0,"delta":"Hel"}"#,
        )
        .unwrap();
        assert_eq!(event.kind(), EventKind::OutputTextDelta);
        assert_eq!(event.sequence_number(), 4);
        match event {
            StreamEvent::OutputTextDelta(delta) => assert_eq!(delta.delta, "Hel"),
            other => panic!("expected text delta, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_unrecognized_not_malformed() {
        let err = StreamEvent::from_value(json!({"type": "response.hologram.delta"})).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnrecognizedEventKind { kind: "response.hologram.delta".into() }
        );
    }

    #[test]
    fn known_kind_with_bad_payload_is_malformed() {
        let err = StreamEvent::from_value(json!({"type": "response.output_text.delta"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedEvent { kind, .. } if kind == "response.output_text.delta"));
    }

    #[test]
    fn missing_type_is_malformed() {
        let err = StreamEvent::from_value(json!({"delta": "x"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedEvent { .. }));
    }

    #[test]
    fn opaque_events_keep_their_fields() {
        let event = StreamEvent::from_value(json!({
            "type": "response.reasoning_summary_text.delta",
            "sequence_number": 9,
            "delta": "thinking"
        }))
        .unwrap();
        match event {
            StreamEvent::ReasoningSummaryTextDelta(opaque) => {
                assert_eq!(opaque.sequence_number, 9);
                assert_eq!(opaque.fields["delta"], "thinking");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
