//! ochat: streaming chat over the Responses API with MCP-backed tools.
//!
//! A [`Conversation`](agent::Conversation) streams each turn from a
//! [`ModelService`](provider::ModelService), runs the tool calls the model
//! makes against a [`CapabilityRegistry`](tools::CapabilityRegistry), and
//! feeds the results back as a continuation turn. Tools are local closures,
//! the built-in `bye` terminator, or tools discovered on MCP servers through
//! a [`CapabilityProvider`](mcp::CapabilityProvider).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ochat::prelude::*;
//!
//! # async fn example() -> ochat::error::Result<()> {
//! let service = Arc::new(ResponsesService::new("sk-...", None));
//! let settings = ConversationSettings::builder().model("gpt-4.1").build();
//! let mut conversation = Conversation::new(service, settings);
//! let summary = conversation.submit("Hello!").await?;
//! println!("{}", summary.text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
