//! Capability trait and closure-based capability wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::{CapabilityParameters, CapabilityResult, FunctionToolDescriptor};
use crate::error::CapabilityError;

/// A named, invocable function the model may call.
///
/// Implementations may be local (closures, the built-in terminator) or
/// remote (tools discovered on an MCP server).
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name the model uses to call this capability.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &CapabilityParameters;

    /// Whether the model service should enforce the schema strictly.
    fn strict(&self) -> bool {
        false
    }

    async fn invoke(&self, args: ToolArguments) -> Result<CapabilityResult, CapabilityError>;

    fn descriptor(&self) -> FunctionToolDescriptor {
        FunctionToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
            strict: self.strict(),
        }
    }
}

type CapabilityHandler = dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<CapabilityResult, CapabilityError>> + Send>>
    + Send
    + Sync;

/// Local capability backed by an async closure.
pub struct FunctionCapability {
    name: String,
    description: String,
    parameters: CapabilityParameters,
    strict: bool,
    handler: Arc<CapabilityHandler>,
}

impl FunctionCapability {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: CapabilityParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CapabilityResult, CapabilityError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            strict: false,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[async_trait]
impl Capability for FunctionCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &CapabilityParameters {
        &self.parameters
    }

    fn strict(&self) -> bool {
        self.strict
    }

    async fn invoke(&self, args: ToolArguments) -> Result<CapabilityResult, CapabilityError> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for FunctionCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCapability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("strict", &self.strict)
            .finish()
    }
}
