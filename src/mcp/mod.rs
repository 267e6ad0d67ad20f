//! Model Context Protocol (MCP) capability servers.

pub mod client;
pub mod params;
pub mod provider;
pub mod schema;
pub mod session;

pub use params::{HttpParameters, ServerParameters, StdioParameters};
pub use provider::{CapabilityProvider, RemoteCapability};
pub use schema::RemoteToolSchema;
pub use session::{McpSession, ServerConnector, SessionFactory, SessionOps, SessionState};
