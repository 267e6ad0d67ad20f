//! Capabilities backed by a remote MCP server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::params::ServerParameters;
use super::schema::RemoteToolSchema;
use super::session::{ServerConnector, SessionFactory};
use crate::error::CapabilityError;
use crate::tools::{Capability, CapabilityParameters, CapabilityResult, ToolArguments};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// A remote capability server.
///
/// Every operation opens its own session and closes it before returning,
/// whatever the outcome. Nothing is cached between calls.
pub struct CapabilityProvider {
    name: String,
    factory: Arc<dyn SessionFactory>,
    call_timeout: Duration,
}

impl CapabilityProvider {
    pub fn new(name: impl Into<String>, params: ServerParameters) -> Self {
        Self::with_factory(name, Arc::new(ServerConnector::new(params)))
    }

    pub fn with_factory(name: impl Into<String>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Bound on a single tool call once its session is open.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> String {
        self.factory.endpoint()
    }

    /// List the server's tools as capabilities bound to this provider.
    pub async fn discover(self: &Arc<Self>) -> Result<Vec<Arc<dyn Capability>>, CapabilityError> {
        let mut session = self.factory.open().await?;
        let listed = session.list_tools().await;
        session.close().await;

        let schemas = listed?;
        info!(provider = %self.name, count = schemas.len(), "discovered capabilities");
        Ok(schemas
            .into_iter()
            .map(|schema| Arc::new(RemoteCapability::new(Arc::clone(self), schema)) as Arc<dyn Capability>)
            .collect())
    }

    /// Call one tool. Failures come back as an error result, never as `Err`.
    pub async fn invoke(&self, name: &str, args: &ToolArguments) -> CapabilityResult {
        match self.try_invoke(name, args).await {
            Ok(result) => result,
            Err(err) => {
                warn!(provider = %self.name, capability = %name, error = %err, "remote capability failed");
                CapabilityResult::from(err)
            }
        }
    }

    async fn try_invoke(
        &self,
        name: &str,
        args: &ToolArguments,
    ) -> Result<CapabilityResult, CapabilityError> {
        let arguments = args.to_object()?;
        let mut session = self.factory.open().await?;
        let outcome = tokio::time::timeout(self.call_timeout, session.call_tool(name, arguments)).await;
        session.close().await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                name: name.to_string(),
                timeout_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for CapabilityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityProvider")
            .field("name", &self.name)
            .field("endpoint", &self.factory.endpoint())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

/// One tool discovered on a [`CapabilityProvider`].
pub struct RemoteCapability {
    provider: Arc<CapabilityProvider>,
    name: String,
    description: String,
    parameters: CapabilityParameters,
}

impl RemoteCapability {
    pub fn new(provider: Arc<CapabilityProvider>, schema: RemoteToolSchema) -> Self {
        let parameters = schema.parameters();
        Self {
            provider,
            name: schema.name,
            description: schema.description.unwrap_or_default(),
            parameters,
        }
    }

    pub fn provider(&self) -> &CapabilityProvider {
        &self.provider
    }
}

#[async_trait]
impl Capability for RemoteCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &CapabilityParameters {
        &self.parameters
    }

    async fn invoke(&self, args: ToolArguments) -> Result<CapabilityResult, CapabilityError> {
        Ok(self.provider.invoke(&self.name, &args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::session::SessionOps;
    use rmcp::model::JsonObject;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        FailCall,
        Hang,
        RefuseOpen,
    }

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        calls: Mutex<Vec<(String, Option<JsonObject>)>>,
    }

    struct MockSession {
        behavior: Behavior,
        counters: Arc<Counters>,
        closed: bool,
    }

    #[async_trait]
    impl SessionOps for MockSession {
        async fn list_tools(&mut self) -> Result<Vec<RemoteToolSchema>, CapabilityError> {
            Ok(vec![
                RemoteToolSchema {
                    name: "get_profile".into(),
                    description: Some("Look up a profile".into()),
                    input_schema: json!({"$schema": "x", "type": "object", "properties": {"user": {"type": "string"}}}),
                },
                RemoteToolSchema {
                    name: "get_user_token".into(),
                    description: None,
                    input_schema: json!({}),
                },
            ])
        }

        async fn call_tool(
            &mut self,
            name: &str,
            arguments: Option<JsonObject>,
        ) -> Result<CapabilityResult, CapabilityError> {
            self.counters
                .calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            match self.behavior {
                Behavior::Succeed => Ok(CapabilityResult::text("Ada Lovelace")),
                Behavior::FailCall => Err(CapabilityError::Provider {
                    name: name.to_string(),
                    message: "MCP error -32603: boom".into(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(CapabilityResult::text("late"))
                }
                Behavior::RefuseOpen => unreachable!("session never opens"),
            }
        }

        async fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct MockFactory {
        behavior: Behavior,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl SessionFactory for MockFactory {
        fn endpoint(&self) -> String {
            "mock://profiles".into()
        }

        async fn open(&self) -> Result<Box<dyn SessionOps>, CapabilityError> {
            if let Behavior::RefuseOpen = self.behavior {
                return Err(CapabilityError::Connection {
                    endpoint: self.endpoint(),
                    message: "Connection refused".into(),
                });
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession {
                behavior: self.behavior,
                counters: Arc::clone(&self.counters),
                closed: false,
            }))
        }
    }

    fn provider(behavior: Behavior) -> (Arc<CapabilityProvider>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let factory = Arc::new(MockFactory {
            behavior,
            counters: Arc::clone(&counters),
        });
        let provider = CapabilityProvider::with_factory("profiles", factory)
            .with_call_timeout(Duration::from_millis(50));
        (Arc::new(provider), counters)
    }

    #[tokio::test]
    async fn discover_maps_tools_and_releases_the_session() {
        let (provider, counters) = provider(Behavior::Succeed);
        let capabilities = provider.discover().await.unwrap();

        let names: Vec<_> = capabilities.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["get_profile", "get_user_token"]);
        assert!(capabilities[0].parameters().schema.get("$schema").is_none());
        assert_eq!(capabilities[1].parameters().schema["type"], "object");
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_invocation_uses_a_fresh_session() {
        let (provider, counters) = provider(Behavior::Succeed);
        let capabilities = provider.discover().await.unwrap();

        for _ in 0..2 {
            let result = capabilities[0]
                .invoke(ToolArguments::new("get_profile", json!({"user": "ada"})))
                .await
                .unwrap();
            assert_eq!(result.text_content(), "Ada Lovelace");
        }

        assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 3);
        let calls = counters.calls.lock().unwrap();
        assert_eq!(calls[0].0, "get_profile");
        assert_eq!(calls[0].1.as_ref().unwrap()["user"], "ada");
    }

    #[tokio::test]
    async fn call_failures_become_error_results_and_still_close() {
        let (provider, counters) = provider(Behavior::FailCall);
        let result = provider
            .invoke("get_profile", &ToolArguments::new("get_profile", json!({})))
            .await;

        assert!(result.is_error);
        assert!(result.text_content().contains("boom"));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_an_error_result() {
        let (provider, counters) = provider(Behavior::RefuseOpen);
        let result = provider
            .invoke("get_profile", &ToolArguments::new("get_profile", json!({})))
            .await;

        assert!(result.is_error);
        assert!(result.text_content().contains("Connection refused"));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_release_the_session() {
        let (provider, counters) = provider(Behavior::Hang);
        let result = provider
            .invoke("get_profile", &ToolArguments::new("get_profile", json!({})))
            .await;

        assert!(result.is_error);
        assert!(result.text_content().contains("timed out"));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected_before_connecting() {
        let (provider, counters) = provider(Behavior::Succeed);
        let result = provider
            .invoke("get_profile", &ToolArguments::new("get_profile", json!([1, 2])))
            .await;

        assert!(result.is_error);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }
}
