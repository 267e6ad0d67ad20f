//! Capabilities the model can call.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use builtin::{RunningFlag, TerminatorCapability, TERMINATOR_NAME};
pub use registry::CapabilityRegistry;
pub use tool::{Capability, FunctionCapability};
pub use types::{
    CapabilityParameters, CapabilityResult, ContentPart, FunctionToolDescriptor, ToolDescriptor,
};
