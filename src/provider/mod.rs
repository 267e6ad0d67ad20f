//! Model service trait and the OpenAI Responses implementation.

pub mod http;
pub mod openai_responses;
pub mod sse;

pub use openai_responses::ResponsesService;

use async_trait::async_trait;
use bon::Builder;
use futures::stream::BoxStream;

use crate::error::OchatError;
use crate::tools::ToolDescriptor;
use crate::types::{StreamEvent, TurnId, TurnInput};

/// Decoded events of one turn, in arrival order.
pub type EventStream = BoxStream<'static, Result<StreamEvent, OchatError>>;

/// Everything needed to start one turn.
#[derive(Debug, Clone, Builder)]
pub struct TurnRequest {
    #[builder(into)]
    pub model: String,
    pub input: TurnInput,
    /// Links the turn to the previous one so the service keeps the history.
    pub previous_turn_id: Option<TurnId>,
    #[builder(default)]
    pub tools: Vec<ToolDescriptor>,
    #[builder(into)]
    pub instructions: Option<String>,
    #[builder(default = true)]
    pub store: bool,
}

/// A streaming model service.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Service name for logs (e.g. "openai-responses").
    fn name(&self) -> &str;

    /// Start a turn and return its event stream.
    ///
    /// Errors before the first event (HTTP status, network) come back as
    /// `Err`; failures mid-stream are yielded as stream items.
    async fn create_turn(&self, request: &TurnRequest) -> Result<EventStream, OchatError>;
}
