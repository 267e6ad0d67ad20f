//! Conversation runtime: event dispatch, tool invocation, turn sequencing.

pub mod conversation;
pub mod dispatcher;
pub mod events;
pub mod invocation;

pub use conversation::{Conversation, ConversationSettings, TurnSummary};
pub use dispatcher::{Dispatch, EventDispatcher};
pub use events::{ConversationEvent, EventPayload, EventSink};
pub use invocation::{ContinuationQueue, ToolInvocationLoop};
