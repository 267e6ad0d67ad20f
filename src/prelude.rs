//! Convenience re-exports for common use.

pub use crate::agent::{Conversation, ConversationSettings, EventPayload, TurnSummary};
pub use crate::config::OchatConfig;
pub use crate::error::{CapabilityError, OchatError, ProtocolError, Result};
pub use crate::mcp::{CapabilityProvider, ServerParameters};
pub use crate::provider::{ModelService, ResponsesService, TurnRequest};
pub use crate::tools::{
    Capability, CapabilityParameters, CapabilityResult, FunctionCapability, ToolArguments,
};
pub use crate::types::{StreamEvent, TurnId, TurnState};
