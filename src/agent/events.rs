//! Conversation event stream types.
//!
//! The conversation never prints. Everything the console shows is emitted as
//! a [`ConversationEvent`] to an [`EventSink`], in the order it happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{TurnId, TurnState};

/// Concrete event payloads emitted by a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Emitted once, before the first prompt.
    Banner {
        model: String,
        instructions: String,
        tools: Vec<String>,
    },
    /// The conversation is waiting for user input.
    Prompt,
    /// A turn was submitted to the model service.
    TurnStarted { continuation: bool },
    /// Incremental assistant text, forwarded as soon as it arrives.
    TextDelta { item_id: String, delta: String },
    /// The model asked for a capability to be invoked.
    ToolCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// The packaged output sent back for a call.
    ToolResult {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
    },
    /// A hosted web search step.
    WebSearch { action: String },
    TurnFinished { state: TurnState },
    TurnFailed {
        error: String,
        hint: Option<String>,
    },
    /// The terminator capability ran; no further turns start.
    Terminated,
}

/// Envelope for conversation events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub conversation_id: Uuid,
    pub turn_id: Option<TurnId>,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

pub type EventSink = Arc<dyn Fn(ConversationEvent) + Send + Sync>;

/// Stamps payloads with ids and a per-conversation sequence number.
pub(crate) struct Emitter {
    conversation_id: Uuid,
    seq: AtomicU64,
    sink: Option<EventSink>,
}

impl Emitter {
    pub(crate) fn new(sink: Option<EventSink>) -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            seq: AtomicU64::new(0),
            sink,
        }
    }

    pub(crate) fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub(crate) fn emit(&self, turn_id: Option<&TurnId>, payload: EventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        sink(ConversationEvent {
            conversation_id: self.conversation_id,
            turn_id: turn_id.cloned(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emitter_numbers_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let emitter = Emitter::new(Some(Arc::new(move |event: ConversationEvent| {
            sink_seen.lock().unwrap().push(event);
        })));

        emitter.emit(None, EventPayload::TurnStarted { continuation: false });
        emitter.emit(
            Some(&TurnId::new("resp_1")),
            EventPayload::TurnFinished { state: TurnState::Completed },
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].seq, 0);
        assert_eq!(seen[1].seq, 1);
        assert_eq!(seen[1].turn_id.as_ref().map(TurnId::as_str), Some("resp_1"));
        assert_eq!(seen[0].conversation_id, emitter.conversation_id());
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let value = serde_json::to_value(EventPayload::WebSearch {
            action: "Searching for: rust".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "web_search");
    }
}
