//! Core types: stream events, output items, turns.

pub mod event;
pub mod item;
pub mod turn;

pub use event::{EventKind, StreamEvent};
pub use item::{OutputItem, WebSearchAction};
pub use turn::{FunctionCallOutput, OutputItemState, ToolCall, Turn, TurnId, TurnInput, TurnState};
