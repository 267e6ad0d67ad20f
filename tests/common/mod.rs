//! Shared test helpers: a scripted model service and event recording.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use ochat::agent::{ConversationEvent, EventPayload, EventSink};
use ochat::error::OchatError;
use ochat::provider::{EventStream, ModelService, TurnRequest};
use ochat::types::StreamEvent;

/// A model service that replays one scripted event list per turn and
/// records every request it receives.
#[derive(Default)]
pub struct ScriptedModelService {
    turns: Mutex<VecDeque<Vec<Value>>>,
    requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedModelService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_turn(&self, events: Vec<Value>) {
        self.turns.lock().unwrap().push_back(events);
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelService for ScriptedModelService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_turn(&self, request: &TurnRequest) -> Result<EventStream, OchatError> {
        self.requests.lock().unwrap().push(request.clone());
        let events = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OchatError::InvalidState("no scripted turn left".into()))?;
        let decoded: Vec<Result<StreamEvent, OchatError>> = events
            .into_iter()
            .map(|value| StreamEvent::from_value(value).map_err(OchatError::from))
            .collect();
        Ok(Box::pin(stream::iter(decoded)))
    }
}

/// Builds the event list of one turn with increasing sequence numbers.
pub struct TurnScript {
    id: String,
    seq: u64,
    next_index: u32,
    events: Vec<Value>,
}

impl TurnScript {
    pub fn new(id: &str) -> Self {
        let mut script = Self {
            id: id.to_string(),
            seq: 0,
            next_index: 0,
            events: Vec::new(),
        };
        script.lifecycle("response.created", "in_progress");
        script.lifecycle("response.in_progress", "in_progress");
        script
    }

    fn push(&mut self, mut event: Value) {
        event["sequence_number"] = json!(self.seq);
        self.seq += 1;
        self.events.push(event);
    }

    fn lifecycle(&mut self, kind: &str, status: &str) {
        let id = self.id.clone();
        self.push(json!({"type": kind, "response": {"id": id, "status": status}}));
    }

    /// A message streamed as the given deltas.
    pub fn message(mut self, deltas: &[&str]) -> Self {
        let index = self.next_index;
        self.next_index += 1;
        let item_id = format!("msg_{}_{index}", self.id);
        self.push(json!({"type": "response.output_item.added", "output_index": index,
            "item": {"type": "message", "id": item_id, "role": "assistant", "content": []}}));
        self.push(json!({"type": "response.content_part.added", "item_id": item_id,
            "output_index": index, "content_index": 0, "part": {"type": "output_text", "text": ""}}));
        for delta in deltas {
            self.push(json!({"type": "response.output_text.delta", "item_id": item_id,
                "output_index": index, "content_index": 0, "delta": delta}));
        }
        let text: String = deltas.concat();
        self.push(json!({"type": "response.output_text.done", "item_id": item_id,
            "output_index": index, "content_index": 0, "text": text}));
        self.push(json!({"type": "response.content_part.done", "item_id": item_id,
            "output_index": index, "content_index": 0, "part": {"type": "output_text", "text": text}}));
        self.push(json!({"type": "response.output_item.done", "output_index": index,
            "item": {"type": "message", "id": item_id, "role": "assistant",
                     "content": [{"type": "output_text", "text": text, "annotations": []}]}}));
        self
    }

    /// A function call whose arguments stream in two halves.
    pub fn tool_call(mut self, call_id: &str, name: &str, arguments: &str) -> Self {
        let index = self.next_index;
        self.next_index += 1;
        let item_id = format!("fc_{call_id}");
        self.push(json!({"type": "response.output_item.added", "output_index": index,
            "item": {"type": "function_call", "id": item_id, "call_id": call_id, "name": name, "arguments": ""}}));
        let split = arguments.len() / 2;
        let split = (split..=arguments.len())
            .find(|i| arguments.is_char_boundary(*i))
            .unwrap_or(arguments.len());
        for delta in [&arguments[..split], &arguments[split..]] {
            self.push(json!({"type": "response.function_call_arguments.delta",
                "item_id": item_id, "output_index": index, "delta": delta}));
        }
        self.push(json!({"type": "response.function_call_arguments.done",
            "item_id": item_id, "output_index": index, "arguments": arguments}));
        self.push(json!({"type": "response.output_item.done", "output_index": index,
            "item": {"type": "function_call", "id": item_id, "call_id": call_id, "name": name,
                     "arguments": arguments, "status": "completed"}}));
        self
    }

    /// Any raw event, inserted as-is apart from its sequence number.
    pub fn raw(mut self, event: Value) -> Self {
        self.push(event);
        self
    }

    pub fn completed(mut self) -> Vec<Value> {
        self.lifecycle("response.completed", "completed");
        self.events
    }

    pub fn failed(mut self, message: &str) -> Vec<Value> {
        let id = self.id.clone();
        self.push(json!({"type": "response.failed", "response": {"id": id, "status": "failed",
            "error": {"code": "server_error", "message": message}}}));
        self.events
    }

    /// Stop without a terminal lifecycle event.
    pub fn truncated(self) -> Vec<Value> {
        self.events
    }
}

/// A sink that keeps every event, plus the shared log it writes to.
pub fn recording_sink() -> (EventSink, Arc<Mutex<Vec<ConversationEvent>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&log);
    let sink: EventSink = Arc::new(move |event: ConversationEvent| {
        sink_log.lock().unwrap().push(event);
    });
    (sink, log)
}

pub fn payloads(log: &Arc<Mutex<Vec<ConversationEvent>>>) -> Vec<EventPayload> {
    log.lock()
        .unwrap()
        .iter()
        .map(|event| event.payload.clone())
        .collect()
}
