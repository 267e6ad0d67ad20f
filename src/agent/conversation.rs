//! Cross-turn conversation state and turn sequencing.

use std::sync::Arc;

use bon::Builder;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatcher::{Dispatch, EventDispatcher};
use super::events::{Emitter, EventPayload, EventSink};
use super::invocation::{ContinuationQueue, ToolInvocationLoop};
use crate::error::{CapabilityError, OchatError, ProtocolError, Result};
use crate::mcp::CapabilityProvider;
use crate::provider::{ModelService, TurnRequest};
use crate::tools::{
    Capability, CapabilityRegistry, RunningFlag, TerminatorCapability, ToolDescriptor,
};
use crate::types::{Turn, TurnId, TurnInput, TurnState};

pub const DEFAULT_MAX_CONTINUATIONS: usize = 16;

/// Per-conversation request settings.
#[derive(Debug, Clone, Builder)]
pub struct ConversationSettings {
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    pub instructions: Option<String>,
    /// Offer the service-hosted web search tool.
    #[builder(default)]
    pub web_search: bool,
    #[builder(default = true)]
    pub store: bool,
    /// Longest chain of continuation turns one user input may start.
    #[builder(default = DEFAULT_MAX_CONTINUATIONS)]
    pub max_continuations: usize,
}

/// Outcome of one user input, including any continuation turns.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    /// Id of the last turn in the chain.
    pub turn_id: Option<TurnId>,
    pub state: TurnState,
    /// Assistant text of every turn in the chain, in order.
    pub text: String,
    pub tool_calls: usize,
    pub continuations: usize,
}

/// A single logical conversation with a model service.
///
/// Turns run strictly one at a time. Tool calls finished during a turn are
/// invoked before the next event is handled, and their outputs are sent
/// together as one continuation turn once the parent turn has reached its
/// terminal event.
pub struct Conversation {
    service: Arc<dyn ModelService>,
    registry: CapabilityRegistry,
    running: RunningFlag,
    last_turn_id: Option<TurnId>,
    settings: ConversationSettings,
    emitter: Emitter,
}

impl Conversation {
    /// Create a conversation with the built-in terminator registered.
    pub fn new(service: Arc<dyn ModelService>, settings: ConversationSettings) -> Self {
        let running = RunningFlag::new();
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(TerminatorCapability::new(running.clone())));
        Self {
            service,
            registry,
            running,
            last_turn_id: None,
            settings,
            emitter: Emitter::new(None),
        }
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.emitter = Emitter::new(Some(sink));
        self
    }

    /// Register a capability. Returns the one it replaced, if any.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        self.registry.register(capability)
    }

    /// Discover a provider's capabilities and register them all.
    pub async fn register_provider(
        &mut self,
        provider: &Arc<CapabilityProvider>,
    ) -> std::result::Result<usize, CapabilityError> {
        let capabilities = provider.discover().await?;
        let count = capabilities.len();
        for capability in capabilities {
            self.register(capability);
        }
        info!(provider = %provider.name(), count, "registered provider capabilities");
        Ok(count)
    }

    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn last_turn_id(&self) -> Option<&TurnId> {
        self.last_turn_id.as_ref()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    /// Tools advertised with every turn.
    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self
            .registry
            .descriptors()
            .into_iter()
            .map(ToolDescriptor::Function)
            .collect();
        if self.settings.web_search {
            tools.push(ToolDescriptor::WebSearchPreview);
        }
        tools
    }

    /// Emit the startup banner.
    pub fn announce(&self) {
        let mut tools: Vec<String> = self.registry.names().map(str::to_string).collect();
        if self.settings.web_search {
            tools.push("web_search_preview".into());
        }
        self.emitter.emit(
            None,
            EventPayload::Banner {
                model: self.settings.model.clone(),
                instructions: self.settings.instructions.clone().unwrap_or_default(),
                tools,
            },
        );
    }

    /// Run one user input to completion, following continuation turns.
    ///
    /// A failed turn is reported to the event sink and returned as `Err`;
    /// the conversation stays usable either way. On failure the chain is
    /// rolled back to the turn the input followed, since a failed chain may
    /// end on a turn whose tool calls were never answered.
    pub async fn submit(&mut self, text: impl Into<String>) -> Result<TurnSummary> {
        let anchor = self.last_turn_id.clone();
        match self.run_chain(TurnInput::Text(text.into())).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(error = %err, "turn failed");
                self.emitter.emit(
                    self.last_turn_id.as_ref(),
                    EventPayload::TurnFailed {
                        error: err.to_string(),
                        hint: err.recovery_suggestion().hint().map(str::to_string),
                    },
                );
                debug!(failed = ?self.last_turn_id, restored = ?anchor, "rolling back to last good turn");
                self.last_turn_id = anchor;
                Err(err)
            }
        }
    }

    async fn run_chain(&mut self, input: TurnInput) -> Result<TurnSummary> {
        let mut input = input;
        let mut summary = TurnSummary {
            turn_id: None,
            state: TurnState::Created,
            text: String::new(),
            tool_calls: 0,
            continuations: 0,
        };

        loop {
            let (turn, mut queue) = self.run_turn(input).await?;
            summary.turn_id = turn.id.clone();
            summary.state = turn.state;
            summary.text.push_str(&turn.message_text());
            summary.tool_calls += queue.len();

            let Some(batch) = queue.drain_batch() else {
                return Ok(summary);
            };
            if !self.running.is_running() {
                debug!(pending = batch.len(), "conversation stopped, not starting a continuation");
                return Ok(summary);
            }
            if summary.continuations >= self.settings.max_continuations {
                return Err(OchatError::ContinuationLimit(self.settings.max_continuations));
            }
            summary.continuations += 1;
            input = TurnInput::ToolOutputs(batch);
        }
    }

    /// Stream one turn to its terminal event.
    async fn run_turn(&mut self, input: TurnInput) -> Result<(Turn, ContinuationQueue)> {
        let continuation = input.is_continuation();
        let request = TurnRequest::builder()
            .model(self.settings.model.clone())
            .input(input)
            .maybe_previous_turn_id(self.last_turn_id.clone())
            .tools(self.tool_descriptors())
            .maybe_instructions(self.settings.instructions.clone())
            .store(self.settings.store)
            .build();

        self.emitter
            .emit(self.last_turn_id.as_ref(), EventPayload::TurnStarted { continuation });

        let mut dispatcher = EventDispatcher::new();
        let mut queue = ContinuationQueue::new();
        match self.stream_turn(&request, &mut dispatcher, &mut queue).await {
            Ok(state) => {
                let turn = dispatcher.into_turn();
                if state == TurnState::Incomplete {
                    warn!(reason = ?turn.reason, "turn ended incomplete");
                }
                if turn.out_of_order > 0 {
                    warn!(count = turn.out_of_order, "turn had out-of-order sequence numbers");
                }
                self.emitter
                    .emit(turn.id.as_ref(), EventPayload::TurnFinished { state });
                Ok((turn, queue))
            }
            Err(err) => {
                dispatcher.mark_failed();
                let turn = dispatcher.into_turn();
                if !queue.is_empty() {
                    warn!(dropped = queue.len(), "turn failed with unanswered tool calls");
                }
                self.emitter.emit(
                    turn.id.as_ref(),
                    EventPayload::TurnFinished {
                        state: TurnState::Failed,
                    },
                );
                Err(err)
            }
        }
    }

    /// Consume the turn's events up to its terminal state.
    async fn stream_turn(
        &mut self,
        request: &TurnRequest,
        dispatcher: &mut EventDispatcher,
        queue: &mut ContinuationQueue,
    ) -> Result<TurnState> {
        let mut stream = self.service.create_turn(request).await?;

        while let Some(event) = stream.next().await {
            let dispatch = dispatcher.handle(event?)?;
            let turn_id = dispatcher.turn().id.as_ref();
            match dispatch {
                Dispatch::None => {}
                Dispatch::Lifecycle { id, state } => {
                    self.last_turn_id = Some(id);
                    match state {
                        TurnState::Failed => {
                            return Err(OchatError::TurnFailed(
                                dispatcher
                                    .turn()
                                    .reason
                                    .clone()
                                    .unwrap_or_else(|| "no reason given".into()),
                            ))
                        }
                        state if state.is_terminal() => return Ok(state),
                        _ => {}
                    }
                }
                Dispatch::TextDelta { item_id, delta } => {
                    self.emitter
                        .emit(turn_id, EventPayload::TextDelta { item_id, delta });
                }
                Dispatch::MessageDone { item_id, text } => {
                    debug!(item_id = %item_id, chars = text.len(), "message finished");
                }
                Dispatch::WebSearch(action) => {
                    self.emitter.emit(turn_id, EventPayload::WebSearch { action });
                }
                Dispatch::ToolCall(call) => {
                    self.emitter.emit(
                        turn_id,
                        EventPayload::ToolCall {
                            call_id: call.call_id.clone(),
                            name: call.name.clone(),
                            arguments: call.raw_arguments.clone(),
                        },
                    );
                    let was_running = self.running.is_running();
                    let result = ToolInvocationLoop::new(&self.registry).invoke(&call).await;
                    let output = ToolInvocationLoop::package(&call, &result);
                    self.emitter.emit(
                        turn_id,
                        EventPayload::ToolResult {
                            call_id: call.call_id.clone(),
                            name: call.name.clone(),
                            output: output.output.clone(),
                            is_error: result.is_error,
                        },
                    );
                    if was_running && !self.running.is_running() {
                        self.emitter.emit(turn_id, EventPayload::Terminated);
                    }
                    queue.push(output);
                }
            }
        }

        Err(ProtocolError::StreamEnded.into())
    }

    /// Read user lines until end of input, cancellation, or the terminator.
    ///
    /// A turn already in flight when cancellation arrives runs to its end;
    /// only the next read is abandoned.
    pub async fn run_interactive<S>(&mut self, mut lines: S, cancel: CancellationToken) -> Result<()>
    where
        S: Stream<Item = std::io::Result<String>> + Unpin,
    {
        self.announce();
        while self.running.is_running() {
            self.emitter.emit(self.last_turn_id.as_ref(), EventPayload::Prompt);
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next() => line,
            };
            let line = match line {
                Some(line) => line?,
                None => break,
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            // Failures are already reported through the event sink.
            let _ = self.submit(text).await;
        }
        self.running.stop();
        info!(conversation = %self.emitter.conversation_id(), "conversation ended");
        Ok(())
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("service", &self.service.name())
            .field("capabilities", &self.registry.len())
            .field("running", &self.running.is_running())
            .field("last_turn_id", &self.last_turn_id)
            .field("settings", &self.settings)
            .finish()
    }
}
