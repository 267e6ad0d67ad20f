//! Scoped MCP sessions: open, use once, always close.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, ClientInfo, JsonObject, ProtocolVersion};
use rmcp::service::{DynService, RoleClient, RunningService, ServiceError, ServiceExt};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use strum::Display;
use tokio::process::Command;
use tracing::{debug, warn};

use super::client::{map_call_result, map_initialize_error, map_service_error, map_tool_schema};
use super::params::ServerParameters;
use super::schema::RemoteToolSchema;
use crate::error::CapabilityError;
use crate::tools::CapabilityResult;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type McpRunningService = RunningService<RoleClient, DynClientService>;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Unopened,
    TransportOpen,
    Initialized,
    InUse,
    Closing,
    Closed,
}

/// Operations available on an open, initialized session.
#[async_trait]
pub trait SessionOps: Send {
    async fn list_tools(&mut self) -> Result<Vec<RemoteToolSchema>, CapabilityError>;

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CapabilityResult, CapabilityError>;

    /// Release the session and its transport. Idempotent.
    async fn close(&mut self);
}

/// Opens fresh sessions against one server.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    fn endpoint(&self) -> String;

    async fn open(&self) -> Result<Box<dyn SessionOps>, CapabilityError>;
}

/// Opens real rmcp sessions from [`ServerParameters`].
#[derive(Debug, Clone)]
pub struct ServerConnector {
    params: ServerParameters,
}

impl ServerConnector {
    pub fn new(params: ServerParameters) -> Self {
        Self { params }
    }
}

#[async_trait]
impl SessionFactory for ServerConnector {
    fn endpoint(&self) -> String {
        self.params.endpoint()
    }

    async fn open(&self) -> Result<Box<dyn SessionOps>, CapabilityError> {
        Ok(Box::new(McpSession::open(&self.params).await?))
    }
}

/// One connection plus one initialized protocol session.
///
/// A session that is dropped without [`SessionOps::close`] is still torn
/// down: rmcp cancels the running service when it is dropped.
pub struct McpSession {
    endpoint: String,
    service: Option<McpRunningService>,
    state: SessionState,
    request_timeout: Option<Duration>,
    terminate_on_close: bool,
}

impl McpSession {
    /// Open the transport and run the initialize handshake.
    ///
    /// On failure nothing is left open: a partially opened transport is
    /// dropped before the error is returned.
    pub async fn open(params: &ServerParameters) -> Result<Self, CapabilityError> {
        let endpoint = params.endpoint();
        let client_info = ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };
        let mut state = SessionState::Unopened;
        debug!(%endpoint, %state, "opening MCP session");

        let (initialized, init_timeout, request_timeout, terminate_on_close) = match params {
            ServerParameters::Stdio(stdio) => {
                let mut command = Command::new(&stdio.command);
                command.args(&stdio.args).envs(&stdio.env);
                if let Some(cwd) = &stdio.cwd {
                    command.current_dir(cwd);
                }
                let transport =
                    TokioChildProcess::new(command).map_err(|err| CapabilityError::Connection {
                        endpoint: endpoint.clone(),
                        message: format!("failed to spawn: {err}"),
                    })?;
                state = SessionState::TransportOpen;
                debug!(%endpoint, %state, "child process spawned");
                let init_timeout = stdio.init_timeout();
                let initialized =
                    tokio::time::timeout(init_timeout, client_info.into_dyn().serve(transport)).await;
                (initialized, init_timeout, None, true)
            }
            ServerParameters::Http(http) => {
                let mut config = StreamableHttpClientTransportConfig::with_uri(http.url.clone());
                if let Some(token) = http.bearer_token() {
                    config = config.auth_header(token.to_string());
                }
                for (name, _) in http.extra_headers() {
                    warn!(%endpoint, header = %name, "only the Authorization header is forwarded to HTTP servers");
                }
                let transport = StreamableHttpClientTransport::from_config(config);
                state = SessionState::TransportOpen;
                debug!(%endpoint, %state, "HTTP transport configured");
                let init_timeout = http.init_timeout();
                let initialized =
                    tokio::time::timeout(init_timeout, client_info.into_dyn().serve(transport)).await;
                (
                    initialized,
                    init_timeout,
                    Some(http.read_timeout()),
                    http.terminate_on_close,
                )
            }
        };

        let service = match initialized {
            Ok(Ok(service)) => service,
            Ok(Err(err)) => return Err(map_initialize_error(&endpoint, err)),
            Err(_) => {
                return Err(CapabilityError::Connection {
                    endpoint,
                    message: format!(
                        "timed out after {}ms connecting and initializing",
                        init_timeout.as_millis()
                    ),
                })
            }
        };

        state = SessionState::Initialized;
        debug!(%endpoint, %state, "MCP session initialized");
        Ok(Self {
            endpoint,
            service: Some(service),
            state,
            request_timeout,
            terminate_on_close,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn closed_error(endpoint: &str) -> CapabilityError {
    CapabilityError::Connection {
        endpoint: endpoint.to_string(),
        message: "session is closed".into(),
    }
}

/// Apply the per-request bound and map rmcp errors.
async fn bounded<T, F>(
    endpoint: &str,
    limit: Option<Duration>,
    name: &str,
    fut: F,
) -> Result<T, CapabilityError>
where
    F: std::future::Future<Output = Result<T, ServiceError>>,
{
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                return Err(CapabilityError::Timeout {
                    name: name.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        },
        None => fut.await,
    };
    result.map_err(|err| map_service_error(endpoint, name, err))
}

#[async_trait]
impl SessionOps for McpSession {
    async fn list_tools(&mut self) -> Result<Vec<RemoteToolSchema>, CapabilityError> {
        let service = self
            .service
            .as_mut()
            .ok_or_else(|| closed_error(&self.endpoint))?;
        self.state = SessionState::InUse;
        let listing = async move {
            match service.list_all_tools().await {
                Err(ServiceError::UnexpectedResponse) => {
                    service.list_tools(None).await.map(|page| page.tools)
                }
                other => other,
            }
        };
        let tools = bounded(&self.endpoint, self.request_timeout, "tools/list", listing).await?;
        Ok(tools.into_iter().map(map_tool_schema).collect())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CapabilityResult, CapabilityError> {
        let service = self
            .service
            .as_mut()
            .ok_or_else(|| closed_error(&self.endpoint))?;
        self.state = SessionState::InUse;
        let call = service.call_tool(CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments,
            task: None,
        });
        let result = bounded(&self.endpoint, self.request_timeout, name, call).await?;
        Ok(map_call_result(result))
    }

    async fn close(&mut self) {
        let Some(service) = self.service.take() else {
            return;
        };
        self.state = SessionState::Closing;
        debug!(endpoint = %self.endpoint, terminate = self.terminate_on_close, "closing MCP session");
        match service.cancel().await {
            Ok(reason) => debug!(endpoint = %self.endpoint, ?reason, "MCP session closed"),
            Err(err) => warn!(endpoint = %self.endpoint, error = %err, "MCP session did not shut down cleanly"),
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        if self.service.is_some() {
            warn!(endpoint = %self.endpoint, "MCP session dropped without close; cancelling");
        }
    }
}
