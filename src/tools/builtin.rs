//! Built-in capabilities that every conversation carries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::CapabilityError;
use crate::tools::arguments::ToolArguments;
use crate::tools::tool::Capability;
use crate::tools::types::{CapabilityParameters, CapabilityResult};

pub const TERMINATOR_NAME: &str = "bye";

/// Shared "keep going" switch for a conversation.
///
/// Cloned into anything that may end the conversation: the terminator
/// capability, the Ctrl-C handler, the input loop on EOF.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The `bye` capability: lets the model end the conversation.
pub struct TerminatorCapability {
    running: RunningFlag,
    parameters: CapabilityParameters,
}

impl TerminatorCapability {
    pub fn new(running: RunningFlag) -> Self {
        Self {
            running,
            parameters: CapabilityParameters::none(),
        }
    }
}

#[async_trait]
impl Capability for TerminatorCapability {
    fn name(&self) -> &str {
        TERMINATOR_NAME
    }

    fn description(&self) -> &str {
        "Call this function to end the conversation."
    }

    fn parameters(&self) -> &CapabilityParameters {
        &self.parameters
    }

    fn strict(&self) -> bool {
        true
    }

    async fn invoke(&self, _args: ToolArguments) -> Result<CapabilityResult, CapabilityError> {
        info!("terminator invoked; conversation will end");
        self.running.stop();
        Ok(CapabilityResult::text("Conversation shall end."))
    }
}
