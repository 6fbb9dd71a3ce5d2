//! Transport seam and the in-process tool router.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use umcp_primitives::{ServerCapabilities, ServerInfo};
use umcp_tools::{Arguments, Exchange, InvocationHandler, InvocationResult, ToolDescriptor};

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A tool with the same name is already announced.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the conflicting tool.
        name: String,
    },
    /// No tool with this name is announced.
    #[error("unknown tool `{name}`")]
    UnknownTool {
        /// Name that was requested.
        name: String,
    },
    /// The transport was closed.
    #[error("transport is closed")]
    Closed,
    /// The transport did not acknowledge in time.
    #[error("transport did not respond within {limit:?}")]
    Timeout {
        /// Time allowed.
        limit: Duration,
    },
    /// Backend-specific failure.
    #[error("transport backend error: {reason}")]
    Backend {
        /// Human-readable context provided by the backend.
        reason: String,
    },
}

impl TransportError {
    /// Convenience helper to construct backend errors.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// The protocol side tools are announced to.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Declares the server identity and the capability classes it supports.
    async fn open(
        &self,
        info: &ServerInfo,
        capabilities: &ServerCapabilities,
    ) -> TransportResult<()>;

    /// Makes a tool visible to remote callers. Resolves once the tool is
    /// callable.
    async fn announce_tool(
        &self,
        descriptor: ToolDescriptor,
        handler: InvocationHandler,
    ) -> TransportResult<()>;

    /// Stops serving.
    async fn close(&self) -> TransportResult<()>;
}

struct RoutedTool {
    descriptor: ToolDescriptor,
    handler: InvocationHandler,
}

#[derive(Default)]
struct RouterState {
    manifest: Option<(ServerInfo, ServerCapabilities)>,
    tools: Vec<RoutedTool>,
    closed: bool,
}

/// In-process [`ToolTransport`] that keeps announced tools in order and
/// routes calls to their handlers.
#[derive(Default)]
pub struct ToolRouter {
    inner: RwLock<RouterState>,
}

impl fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        let names: Vec<_> = inner
            .tools
            .iter()
            .map(|tool| tool.descriptor.name().as_str().to_owned())
            .collect();
        f.debug_struct("ToolRouter")
            .field("announced", &names)
            .field("closed", &inner.closed)
            .finish()
    }
}

impl ToolRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the server identity recorded by `open`.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.read().manifest.as_ref().map(|(info, _)| info.clone())
    }

    /// Returns the capability classes recorded by `open`.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.read()
            .manifest
            .as_ref()
            .map(|(_, capabilities)| *capabilities)
    }

    /// Returns announced descriptors in announcement order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.read()
            .tools
            .iter()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    /// Returns `true` once the router has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    /// Routes one invocation to the named tool.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after `close`, or
    /// [`TransportError::UnknownTool`] when nothing by that name was announced.
    pub async fn call(
        &self,
        name: &str,
        exchange: Exchange,
        arguments: Option<Arguments>,
    ) -> TransportResult<InvocationResult> {
        let handler = {
            let inner = self.read();
            if inner.closed {
                return Err(TransportError::Closed);
            }
            inner
                .tools
                .iter()
                .find(|tool| tool.descriptor.name().as_str() == name)
                .map(|tool| InvocationHandler::clone(&tool.handler))
                .ok_or_else(|| TransportError::UnknownTool { name: name.into() })?
        };

        debug!(tool = name, invocation = %exchange.id(), "routing tool call");
        Ok(handler(exchange, arguments).await)
    }

    fn read(&self) -> RwLockReadGuard<'_, RouterState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RouterState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ToolTransport for ToolRouter {
    async fn open(
        &self,
        info: &ServerInfo,
        capabilities: &ServerCapabilities,
    ) -> TransportResult<()> {
        let mut inner = self.write();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        inner.manifest = Some((info.clone(), *capabilities));
        info!(server = info.name(), version = info.version(), "tool router opened");
        Ok(())
    }

    async fn announce_tool(
        &self,
        descriptor: ToolDescriptor,
        handler: InvocationHandler,
    ) -> TransportResult<()> {
        let mut inner = self.write();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        if inner
            .tools
            .iter()
            .any(|tool| tool.descriptor.name() == descriptor.name())
        {
            return Err(TransportError::DuplicateTool {
                name: descriptor.name().to_string(),
            });
        }

        debug!(tool = %descriptor.name(), "tool routed");
        inner.tools.push(RoutedTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        let mut inner = self.write();
        if !inner.closed {
            inner.closed = true;
            info!(tools = inner.tools.len(), "tool router closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::FutureExt;
    use umcp_primitives::ToolName;
    use umcp_tools::JsonSchema;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            ToolName::new(name).unwrap(),
            format!("{name} tool"),
            JsonSchema::permissive(),
        )
    }

    fn constant(content: &'static str) -> InvocationHandler {
        Arc::new(move |_exchange: Exchange, _arguments: Option<Arguments>| {
            async move { InvocationResult::success(content) }.boxed()
        })
    }

    #[tokio::test]
    async fn routes_calls_in_announcement_order() {
        let router = ToolRouter::new();
        let info = ServerInfo::new("umcp", "0.3.0").unwrap();
        router
            .open(&info, &ServerCapabilities::bridge_defaults())
            .await
            .unwrap();
        router
            .announce_tool(descriptor("beta"), constant("b"))
            .await
            .unwrap();
        router
            .announce_tool(descriptor("alpha"), constant("a"))
            .await
            .unwrap();

        let names: Vec<_> = router
            .list()
            .iter()
            .map(|d| d.name().as_str().to_owned())
            .collect();
        assert_eq!(names, ["beta", "alpha"]);
        assert_eq!(router.server_info(), Some(info));

        let result = router.call("alpha", Exchange::new(), None).await.unwrap();
        assert_eq!(result.content(), "a");
    }

    #[tokio::test]
    async fn rejects_duplicates_and_unknown_tools() {
        let router = ToolRouter::new();
        router
            .announce_tool(descriptor("echo"), constant("1"))
            .await
            .unwrap();

        let err = router
            .announce_tool(descriptor("echo"), constant("2"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::DuplicateTool { .. }));

        let err = router.call("missing", Exchange::new(), None).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn closed_router_refuses_work() {
        let router = ToolRouter::new();
        router
            .announce_tool(descriptor("echo"), constant("1"))
            .await
            .unwrap();
        router.close().await.unwrap();
        router.close().await.unwrap();

        assert!(router.is_closed());
        assert!(matches!(
            router.call("echo", Exchange::new(), None).await,
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            router.announce_tool(descriptor("late"), constant("x")).await,
            Err(TransportError::Closed)
        ));
    }
}
