//! Per-turn event dispatch.
//!
//! [`EventDispatcher`] owns the [`Turn`] being streamed and turns each
//! [`StreamEvent`] into at most one [`Dispatch`] for the conversation to act
//! on. It performs no I/O, so the conversation decides when tool calls run
//! and where text goes.

use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::types::event::{
    ArgumentsDeltaEvent, ArgumentsDoneEvent, OutputItemEvent, ResponseEvent, TextDeltaEvent,
    TextDoneEvent,
};
use crate::types::{OutputItem, OutputItemState, StreamEvent, ToolCall, Turn, TurnId, TurnState};

/// What the conversation must do after one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    None,
    /// A lifecycle event; terminal states end the turn.
    Lifecycle { id: TurnId, state: TurnState },
    TextDelta { item_id: String, delta: String },
    MessageDone { item_id: String, text: String },
    ToolCall(ToolCall),
    WebSearch(String),
}

#[derive(Debug, Default)]
pub struct EventDispatcher {
    turn: Turn,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn into_turn(self) -> Turn {
        self.turn
    }

    /// Force the turn into `Failed`, for errors raised outside the stream.
    pub fn mark_failed(&mut self) {
        self.turn.state = TurnState::Failed;
    }

    /// Handle one event. Any `Err` fails the turn.
    pub fn handle(&mut self, event: StreamEvent) -> Result<Dispatch, ProtocolError> {
        let kind = event.kind();
        self.observe_sequence(event.sequence_number(), kind.as_str());
        debug!(kind = %kind, seq = event.sequence_number(), "dispatching stream event");

        match event {
            StreamEvent::Created(e) => Ok(self.lifecycle(e, TurnState::Created)),
            StreamEvent::Queued(e) => Ok(self.lifecycle(e, TurnState::Queued)),
            StreamEvent::InProgress(e) => Ok(self.lifecycle(e, TurnState::InProgress)),
            StreamEvent::Completed(e) => Ok(self.lifecycle(e, TurnState::Completed)),
            StreamEvent::Failed(e) => {
                self.turn.reason = e
                    .response
                    .error
                    .as_ref()
                    .map(|err| match &err.code {
                        Some(code) => format!("{code}: {}", err.message),
                        None => err.message.clone(),
                    });
                Ok(self.lifecycle(e, TurnState::Failed))
            }
            StreamEvent::Incomplete(e) => {
                self.turn.reason = e
                    .response
                    .incomplete_details
                    .as_ref()
                    .and_then(|details| details.reason.clone());
                Ok(self.lifecycle(e, TurnState::Incomplete))
            }
            StreamEvent::Error(e) => Err(ProtocolError::ServiceError {
                code: e.code.unwrap_or_else(|| "unknown".into()),
                message: e.message,
            }),

            StreamEvent::OutputItemAdded(e) => {
                self.open_item(e);
                Ok(Dispatch::None)
            }
            StreamEvent::OutputItemDone(e) => self.finish_item(e),
            StreamEvent::ContentPartAdded(e) | StreamEvent::ContentPartDone(e) => {
                match self.turn.items.get(&e.output_index) {
                    Some(OutputItemState::Message { .. }) => Ok(Dispatch::None),
                    Some(_) => Err(ProtocolError::MalformedEvent {
                        kind: kind.as_str().into(),
                        message: format!("content part for non-message item {}", e.item_id),
                    }),
                    None => Err(ProtocolError::UnknownOutputItem {
                        output_index: e.output_index,
                    }),
                }
            }

            StreamEvent::OutputTextDelta(e) => self.text_delta(e),
            StreamEvent::OutputTextDone(e) => self.text_done(e),
            StreamEvent::FunctionCallArgumentsDelta(e) => self.arguments_delta(e),
            StreamEvent::FunctionCallArgumentsDone(e) => self.arguments_done(e),

            StreamEvent::WebSearchCallInProgress(e)
            | StreamEvent::WebSearchCallSearching(e)
            | StreamEvent::WebSearchCallCompleted(e) => {
                debug!(item_id = %e.item_id, kind = %kind, "web search progress");
                Ok(Dispatch::None)
            }

            StreamEvent::OutputTextAnnotationAdded(_)
            | StreamEvent::RefusalDelta(_)
            | StreamEvent::RefusalDone(_)
            | StreamEvent::FileSearchCallInProgress(_)
            | StreamEvent::FileSearchCallSearching(_)
            | StreamEvent::FileSearchCallCompleted(_)
            | StreamEvent::CodeInterpreterCallCodeDelta(_)
            | StreamEvent::CodeInterpreterCallCodeDone(_)
            | StreamEvent::CodeInterpreterCallInProgress(_)
            | StreamEvent::CodeInterpreterCallInterpreting(_)
            | StreamEvent::CodeInterpreterCallCompleted(_)
            | StreamEvent::ImageGenerationCallInProgress(_)
            | StreamEvent::ImageGenerationCallGenerating(_)
            | StreamEvent::ImageGenerationCallPartialImage(_)
            | StreamEvent::ImageGenerationCallCompleted(_)
            | StreamEvent::AudioDelta(_)
            | StreamEvent::AudioDone(_)
            | StreamEvent::AudioTranscriptDelta(_)
            | StreamEvent::AudioTranscriptDone(_)
            | StreamEvent::ReasoningDelta(_)
            | StreamEvent::ReasoningDone(_)
            | StreamEvent::ReasoningSummaryDelta(_)
            | StreamEvent::ReasoningSummaryDone(_)
            | StreamEvent::ReasoningSummaryPartAdded(_)
            | StreamEvent::ReasoningSummaryPartDone(_)
            | StreamEvent::ReasoningSummaryTextDelta(_)
            | StreamEvent::ReasoningSummaryTextDone(_)
            | StreamEvent::McpCallArgumentsDelta(_)
            | StreamEvent::McpCallArgumentsDone(_)
            | StreamEvent::McpCallInProgress(_)
            | StreamEvent::McpCallCompleted(_)
            | StreamEvent::McpCallFailed(_)
            | StreamEvent::McpListToolsInProgress(_)
            | StreamEvent::McpListToolsCompleted(_)
            | StreamEvent::McpListToolsFailed(_) => Err(ProtocolError::UnsupportedEvent {
                kind: kind.as_str().into(),
            }),
        }
    }

    /// Sequence numbers are checked, never used to reorder.
    fn observe_sequence(&mut self, seq: u64, kind: &str) {
        if let Some(last) = self.turn.last_sequence {
            if seq < last {
                self.turn.out_of_order += 1;
                warn!(kind, seq, last, "stream event sequence number went backwards");
            }
        }
        self.turn.last_sequence = Some(seq);
    }

    fn lifecycle(&mut self, event: ResponseEvent, state: TurnState) -> Dispatch {
        let id = TurnId::new(event.response.id);
        self.turn.id = Some(id.clone());
        self.turn.state = state;
        Dispatch::Lifecycle { id, state }
    }

    fn open_item(&mut self, event: OutputItemEvent) {
        let state = match event.item {
            OutputItem::Message(item) => OutputItemState::Message {
                text: item.text(),
                id: item.id,
                done: false,
            },
            OutputItem::FunctionCall(item) => OutputItemState::ToolCall {
                id: item.id,
                call_id: item.call_id,
                name: item.name,
                arguments: item.arguments,
                done: false,
            },
            other => OutputItemState::Other {
                kind: other.kind_name(),
                id: other.id().map(str::to_string),
            },
        };
        if self.turn.items.insert(event.output_index, state).is_some() {
            warn!(output_index = event.output_index, "output item added twice, replacing");
        }
    }

    fn text_delta(&mut self, event: TextDeltaEvent) -> Result<Dispatch, ProtocolError> {
        match self.turn.items.get_mut(&event.output_index) {
            Some(OutputItemState::Message { text, .. }) => {
                text.push_str(&event.delta);
                Ok(Dispatch::TextDelta {
                    item_id: event.item_id,
                    delta: event.delta,
                })
            }
            Some(_) => Err(ProtocolError::MalformedEvent {
                kind: "response.output_text.delta".into(),
                message: format!("text delta for non-message item {}", event.item_id),
            }),
            None => Err(ProtocolError::UnknownOutputItem {
                output_index: event.output_index,
            }),
        }
    }

    fn text_done(&mut self, event: TextDoneEvent) -> Result<Dispatch, ProtocolError> {
        match self.turn.items.get_mut(&event.output_index) {
            Some(OutputItemState::Message { text, .. }) => {
                if *text != event.text {
                    warn!(item_id = %event.item_id, "final text differs from accumulated deltas");
                    *text = event.text;
                }
                Ok(Dispatch::None)
            }
            Some(_) => Err(ProtocolError::MalformedEvent {
                kind: "response.output_text.done".into(),
                message: format!("text done for non-message item {}", event.item_id),
            }),
            None => Err(ProtocolError::UnknownOutputItem {
                output_index: event.output_index,
            }),
        }
    }

    fn arguments_delta(&mut self, event: ArgumentsDeltaEvent) -> Result<Dispatch, ProtocolError> {
        match self.turn.items.get_mut(&event.output_index) {
            Some(OutputItemState::ToolCall { arguments, .. }) => {
                arguments.push_str(&event.delta);
                Ok(Dispatch::None)
            }
            Some(_) => Err(ProtocolError::InvalidToolCall {
                item_id: event.item_id,
                reason: "argument delta for an item that is not a function call".into(),
            }),
            None => Err(ProtocolError::UnknownOutputItem {
                output_index: event.output_index,
            }),
        }
    }

    fn arguments_done(&mut self, event: ArgumentsDoneEvent) -> Result<Dispatch, ProtocolError> {
        match self.turn.items.get_mut(&event.output_index) {
            Some(OutputItemState::ToolCall { arguments, .. }) => {
                *arguments = event.arguments;
                Ok(Dispatch::None)
            }
            Some(_) => Err(ProtocolError::InvalidToolCall {
                item_id: event.item_id,
                reason: "arguments done for an item that is not a function call".into(),
            }),
            None => Err(ProtocolError::UnknownOutputItem {
                output_index: event.output_index,
            }),
        }
    }

    fn finish_item(&mut self, event: OutputItemEvent) -> Result<Dispatch, ProtocolError> {
        let index = event.output_index;
        match event.item {
            OutputItem::Message(item) => {
                let text = match self.turn.items.get_mut(&index) {
                    Some(OutputItemState::Message { text, done, .. }) => {
                        *done = true;
                        if text.is_empty() {
                            *text = item.text();
                        }
                        text.clone()
                    }
                    _ => {
                        let text = item.text();
                        self.turn.items.insert(
                            index,
                            OutputItemState::Message {
                                id: item.id.clone(),
                                text: text.clone(),
                                done: true,
                            },
                        );
                        text
                    }
                };
                Ok(Dispatch::MessageDone {
                    item_id: item.id,
                    text,
                })
            }
            OutputItem::FunctionCall(item) => {
                let buffered = match self.turn.items.get(&index) {
                    Some(OutputItemState::ToolCall { arguments, .. }) => arguments.clone(),
                    _ => String::new(),
                };
                // The finished item carries the complete arguments when present.
                let raw_arguments = if item.arguments.is_empty() {
                    buffered
                } else {
                    item.arguments.clone()
                };
                let item_id = item.id.clone().unwrap_or_else(|| item.call_id.clone());
                if item.call_id.is_empty() {
                    return Err(ProtocolError::InvalidToolCall {
                        item_id,
                        reason: "missing call_id".into(),
                    });
                }
                let arguments = parse_arguments(&item_id, &raw_arguments)?;
                self.turn.items.insert(
                    index,
                    OutputItemState::ToolCall {
                        id: item.id,
                        call_id: item.call_id.clone(),
                        name: item.name.clone(),
                        arguments: raw_arguments.clone(),
                        done: true,
                    },
                );
                Ok(Dispatch::ToolCall(ToolCall {
                    call_id: item.call_id,
                    name: item.name,
                    arguments,
                    raw_arguments,
                }))
            }
            OutputItem::WebSearchCall(item) => {
                let action = item
                    .action
                    .as_ref()
                    .and_then(|action| action.describe())
                    .unwrap_or_else(|| format!("Web search {}", item.status.as_deref().unwrap_or("completed")));
                self.turn.items.insert(
                    index,
                    OutputItemState::Other {
                        kind: "web_search_call",
                        id: Some(item.id),
                    },
                );
                Ok(Dispatch::WebSearch(action))
            }
            item @ (OutputItem::FileSearchCall(_)
            | OutputItem::ComputerCall(_)
            | OutputItem::Reasoning(_)
            | OutputItem::CodeInterpreterCall(_)
            | OutputItem::ImageGenerationCall(_)
            | OutputItem::LocalShellCall(_)
            | OutputItem::McpCall(_)
            | OutputItem::McpListTools(_)
            | OutputItem::McpApprovalRequest(_)) => Err(ProtocolError::UnsupportedOutputItem {
                kind: item.kind_name().into(),
            }),
            OutputItem::Unrecognized => Err(ProtocolError::UnrecognizedOutputItem),
        }
    }
}

fn parse_arguments(item_id: &str, raw: &str) -> Result<serde_json::Value, ProtocolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).map_err(|err| ProtocolError::InvalidToolCall {
        item_id: item_id.to_string(),
        reason: format!("arguments are not valid JSON: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn event(value: Value) -> StreamEvent {
        StreamEvent::from_value(value).unwrap()
    }

    fn run(dispatcher: &mut EventDispatcher, events: Vec<Value>) -> Vec<Dispatch> {
        events
            .into_iter()
            .map(|value| dispatcher.handle(event(value)).unwrap())
            .collect()
    }

    fn created(seq: u64) -> Value {
        json!({"type": "response.created", "sequence_number": seq, "response": {"id": "resp_1", "status": "in_progress"}})
    }

    #[test]
    fn message_text_is_the_concatenation_of_deltas() {
        let mut dispatcher = EventDispatcher::new();
        let deltas = ["The ", "answer ", "is ", "12."];
        let mut events = vec![
            created(0),
            json!({"type": "response.output_item.added", "sequence_number": 1, "output_index": 0,
                   "item": {"type": "message", "id": "msg_1", "role": "assistant", "content": []}}),
        ];
        for (i, delta) in deltas.iter().enumerate() {
            events.push(json!({"type": "response.output_text.delta", "sequence_number": 2 + i,
                               "item_id": "msg_1", "output_index": 0, "content_index": 0, "delta": delta}));
        }
        events.push(json!({"type": "response.output_item.done", "sequence_number": 9, "output_index": 0,
                           "item": {"type": "message", "id": "msg_1", "content": []}}));

        let dispatched = run(&mut dispatcher, events);
        let forwarded: Vec<_> = dispatched
            .iter()
            .filter_map(|d| match d {
                Dispatch::TextDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(forwarded, deltas);
        assert_eq!(
            dispatched.last(),
            Some(&Dispatch::MessageDone {
                item_id: "msg_1".into(),
                text: "The answer is 12.".into()
            })
        );
        assert_eq!(dispatcher.turn().message_text(), "The answer is 12.");
    }

    #[test]
    fn argument_deltas_assemble_into_a_tool_call() {
        let mut dispatcher = EventDispatcher::new();
        let dispatched = run(
            &mut dispatcher,
            vec![
                created(0),
                json!({"type": "response.output_item.added", "sequence_number": 1, "output_index": 0,
                       "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "add", "arguments": ""}}),
                json!({"type": "response.function_call_arguments.delta", "sequence_number": 2,
                       "item_id": "fc_1", "output_index": 0, "delta": "{\"a\":5,"}),
                json!({"type": "response.function_call_arguments.delta", "sequence_number": 3,
                       "item_id": "fc_1", "output_index": 0, "delta": "\"b\":7}"}),
                json!({"type": "response.output_item.done", "sequence_number": 4, "output_index": 0,
                       "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "add"}}),
            ],
        );
        assert_eq!(
            dispatched.last(),
            Some(&Dispatch::ToolCall(ToolCall {
                call_id: "call_1".into(),
                name: "add".into(),
                arguments: json!({"a": 5, "b": 7}),
                raw_arguments: "{\"a\":5,\"b\":7}".into(),
            }))
        );
    }

    #[test]
    fn invalid_argument_json_fails_the_turn() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher
            .handle(event(json!({"type": "response.output_item.done", "output_index": 0,
                "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "add", "arguments": "{\"a\":"}})))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidToolCall { item_id, .. } if item_id == "fc_1"));
    }

    #[test]
    fn missing_call_id_fails_the_turn() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher
            .handle(event(json!({"type": "response.output_item.done", "output_index": 0,
                "item": {"type": "function_call", "id": "fc_1", "name": "add", "arguments": "{}"}})))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidToolCall { reason, .. } if reason == "missing call_id"));
    }

    #[test]
    fn empty_arguments_mean_no_arguments() {
        let mut dispatcher = EventDispatcher::new();
        let dispatched = dispatcher
            .handle(event(json!({"type": "response.output_item.done", "output_index": 0,
                "item": {"type": "function_call", "call_id": "x1", "name": "bye", "arguments": ""}})))
            .unwrap();
        match dispatched {
            Dispatch::ToolCall(call) => assert_eq!(call.arguments, json!({})),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn lifecycle_events_record_the_turn_id() {
        let mut dispatcher = EventDispatcher::new();
        let dispatched = run(
            &mut dispatcher,
            vec![
                created(0),
                json!({"type": "response.completed", "sequence_number": 1, "response": {"id": "resp_1", "status": "completed"}}),
            ],
        );
        assert_eq!(
            dispatched[1],
            Dispatch::Lifecycle {
                id: TurnId::new("resp_1"),
                state: TurnState::Completed
            }
        );
        assert_eq!(dispatcher.turn().id, Some(TurnId::new("resp_1")));
    }

    #[test]
    fn failed_turn_keeps_the_reason() {
        let mut dispatcher = EventDispatcher::new();
        run(
            &mut dispatcher,
            vec![json!({"type": "response.failed", "response": {"id": "resp_1", "status": "failed",
                "error": {"code": "server_error", "message": "The model crashed"}}})],
        );
        assert_eq!(dispatcher.turn().state, TurnState::Failed);
        assert_eq!(dispatcher.turn().reason.as_deref(), Some("server_error: The model crashed"));
    }

    #[test]
    fn recognized_but_unsupported_events_are_fatal() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher
            .handle(event(json!({"type": "response.reasoning_summary_text.delta", "sequence_number": 3,
                "item_id": "rs_1", "output_index": 0, "delta": "thinking"})))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnsupportedEvent {
                kind: "response.reasoning_summary_text.delta".into()
            }
        );
    }

    #[test]
    fn protocol_errors_can_mark_an_open_turn_failed() {
        let mut dispatcher = EventDispatcher::new();
        run(&mut dispatcher, vec![created(0)]);
        assert!(dispatcher
            .handle(event(json!({"type": "response.output_text.delta", "sequence_number": 1,
                "item_id": "msg_9", "output_index": 4, "content_index": 0, "delta": "hi"})))
            .is_err());
        assert_eq!(dispatcher.turn().state, TurnState::Created);

        dispatcher.mark_failed();
        let turn = dispatcher.into_turn();
        assert_eq!(turn.state, TurnState::Failed);
        assert_eq!(turn.id.as_ref().map(TurnId::as_str), Some("resp_1"));
    }

    #[test]
    fn unsupported_output_items_are_fatal_when_done() {
        let mut dispatcher = EventDispatcher::new();
        let item = json!({"type": "code_interpreter_call", "id": "ci_1", "code": "print(1)"});
        dispatcher
            .handle(event(json!({"type": "response.output_item.added", "output_index": 0, "item": item})))
            .unwrap();
        let err = dispatcher
            .handle(event(json!({"type": "response.output_item.done", "output_index": 0, "item": item})))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnsupportedOutputItem {
                kind: "code_interpreter_call".into()
            }
        );

        let err = dispatcher
            .handle(event(json!({"type": "response.output_item.done", "output_index": 1,
                "item": {"type": "hologram", "id": "h_1"}})))
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnrecognizedOutputItem);
    }

    #[test]
    fn deltas_for_unknown_items_are_rejected() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher
            .handle(event(json!({"type": "response.output_text.delta", "item_id": "msg_9",
                "output_index": 4, "content_index": 0, "delta": "hi"})))
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownOutputItem { output_index: 4 });
    }

    #[test]
    fn web_search_items_become_trace_lines() {
        let mut dispatcher = EventDispatcher::new();
        let dispatched = run(
            &mut dispatcher,
            vec![
                json!({"type": "response.web_search_call.searching", "item_id": "ws_1", "output_index": 0}),
                json!({"type": "response.output_item.done", "output_index": 0,
                       "item": {"type": "web_search_call", "id": "ws_1", "status": "completed",
                                "action": {"type": "search", "query": "rust sse"}}}),
            ],
        );
        assert_eq!(dispatched[0], Dispatch::None);
        assert_eq!(dispatched[1], Dispatch::WebSearch("Searching for: rust sse".into()));
    }

    #[test]
    fn backwards_sequence_numbers_are_counted_not_reordered() {
        let mut dispatcher = EventDispatcher::new();
        run(
            &mut dispatcher,
            vec![
                created(5),
                json!({"type": "response.in_progress", "sequence_number": 3, "response": {"id": "resp_1"}}),
            ],
        );
        assert_eq!(dispatcher.turn().out_of_order, 1);
        assert_eq!(dispatcher.turn().state, TurnState::InProgress);
        assert_eq!(dispatcher.turn().last_sequence, Some(3));
    }

    #[test]
    fn error_event_is_a_service_error() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher
            .handle(event(json!({"type": "error", "sequence_number": 1, "code": "rate_limit_exceeded", "message": "slow down"})))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ServiceError {
                code: "rate_limit_exceeded".into(),
                message: "slow down".into()
            }
        );
    }
}
