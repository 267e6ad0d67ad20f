//! Tool invocation and continuation queueing.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::tools::{CapabilityRegistry, CapabilityResult, ToolArguments};
use crate::types::{FunctionCallOutput, ToolCall};

/// Resolves and runs finished tool calls against a registry.
pub struct ToolInvocationLoop<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> ToolInvocationLoop<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Invoke the capability a call names.
    ///
    /// Unknown names and invocation failures come back as error results so
    /// the model can react to them.
    pub async fn invoke(&self, call: &ToolCall) -> CapabilityResult {
        let capability = match self.registry.resolve(&call.name) {
            Ok(capability) => capability,
            Err(err) => {
                warn!(capability = %call.name, call_id = %call.call_id, "model called an unknown capability");
                return CapabilityResult::from(err);
            }
        };

        debug!(capability = %call.name, call_id = %call.call_id, "invoking capability");
        let args = ToolArguments::new(call.name.clone(), call.arguments.clone());
        match capability.invoke(args).await {
            Ok(result) => result,
            Err(err) => {
                warn!(capability = %call.name, error = %err, "capability failed");
                CapabilityResult::from(err)
            }
        }
    }

    /// The continuation input answering `call`.
    pub fn package(call: &ToolCall, result: &CapabilityResult) -> FunctionCallOutput {
        FunctionCallOutput {
            call_id: call.call_id.clone(),
            output: result.to_output_string(),
        }
    }
}

/// Outputs waiting for the parent turn to reach its terminal event.
#[derive(Debug, Default)]
pub struct ContinuationQueue {
    pending: VecDeque<FunctionCallOutput>,
}

impl ContinuationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, output: FunctionCallOutput) {
        self.pending.push_back(output);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Everything queued so far, oldest first, as one continuation batch.
    pub fn drain_batch(&mut self) -> Option<Vec<FunctionCallOutput>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.drain(..).collect())
        }
    }
}
