//! Tool registry and the registration pipeline.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use umcp_capability::{BoxedCapability, Executor, ExecutorError};
use umcp_primitives::{ServerCapabilities, ServerInfo, ToolName};
use umcp_tools::ToolContainer;

use crate::lifecycle::{LifecycleError, ServerEvent, ServerLifecycle, ServerState};
use crate::transport::{ToolTransport, TransportError};

const DEFAULT_NAME: &str = "umcp-server";
const DEFAULT_ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the registration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationConfig {
    announce_timeout: Option<Duration>,
}

impl RegistrationConfig {
    /// Creates a configuration; `None` waits for announcements indefinitely.
    #[must_use]
    pub const fn new(announce_timeout: Option<Duration>) -> Self {
        Self { announce_timeout }
    }

    /// Returns how long one announcement may take.
    #[must_use]
    pub const fn announce_timeout(self) -> Option<Duration> {
        self.announce_timeout
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] when the timeout is zero.
    pub fn validate(self) -> ServerResult<()> {
        if self.announce_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(ServerError::InvalidConfig(
                "announce timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            announce_timeout: Some(DEFAULT_ANNOUNCE_TIMEOUT),
        }
    }
}

/// What registration did with one capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Announced and initialized.
    Active,
    /// Announced, but setup failed; the tool stays callable.
    InitializationFailed {
        /// Setup failure message.
        reason: String,
    },
    /// The transport rejected the tool; setup never ran.
    AnnounceFailed {
        /// Transport failure message.
        reason: String,
    },
    /// No descriptor could be derived; the tool was not announced.
    Skipped,
    /// Registration of this tool panicked.
    Panicked {
        /// Panic message.
        reason: String,
    },
}

impl ToolOutcome {
    /// Returns `true` for [`ToolOutcome::Active`].
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Outcome of registering one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReport {
    name: ToolName,
    outcome: ToolOutcome,
}

impl ToolReport {
    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &ToolName {
        &self.name
    }

    /// Returns what happened to the tool.
    #[must_use]
    pub fn outcome(&self) -> &ToolOutcome {
        &self.outcome
    }
}

/// Outcomes of a `start`, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    tools: Vec<ToolReport>,
}

impl RegistrationReport {
    /// Returns every tool's outcome in declaration order.
    #[must_use]
    pub fn tools(&self) -> &[ToolReport] {
        &self.tools
    }

    /// Looks up the outcome for `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&ToolOutcome> {
        self.tools
            .iter()
            .find(|report| report.name.as_str() == name)
            .map(ToolReport::outcome)
    }

    /// Number of tools that ended up active.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tools
            .iter()
            .filter(|report| report.outcome.is_active())
            .count()
    }

    /// Returns `true` when every tool is active.
    #[must_use]
    pub fn all_active(&self) -> bool {
        self.active_count() == self.tools.len()
    }
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by the server outside the per-tool pipeline.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration was invalid.
    #[error("invalid server configuration: {0}")]
    InvalidConfig(&'static str),
    /// No transport was supplied to the builder.
    #[error("a transport is required")]
    MissingTransport,
    /// Server identity failed validation.
    #[error(transparent)]
    Metadata(#[from] umcp_primitives::Error),
    /// No executor was supplied and none could be derived.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// The transport could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Lifecycle misuse, such as starting a closed server.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Registry of tools bound to one transport.
///
/// Capabilities are registered in declaration order by [`start`](Self::start)
/// and torn down in the same order by [`close`](Self::close).
pub struct McpServer {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    transport: Arc<dyn ToolTransport>,
    executor: Executor,
    config: RegistrationConfig,
    pending: Vec<BoxedCapability>,
    containers: Vec<Arc<ToolContainer>>,
    report: RegistrationReport,
    lifecycle: ServerLifecycle,
}

impl fmt::Debug for McpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServer")
            .field("info", &self.info)
            .field("transport", &"dyn ToolTransport")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("containers", &self.containers)
            .field("state", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}

impl McpServer {
    /// Starts building a server.
    #[must_use]
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::default()
    }

    /// Returns the server identity.
    #[must_use]
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Returns the declared capability classes.
    #[must_use]
    pub const fn capabilities(&self) -> ServerCapabilities {
        self.capabilities
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Returns the registry's default executor.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Returns the containers created so far, in registration order.
    #[must_use]
    pub fn containers(&self) -> &[Arc<ToolContainer>] {
        &self.containers
    }

    /// Returns the report of the last `start`.
    #[must_use]
    pub fn report(&self) -> &RegistrationReport {
        &self.report
    }

    /// Opens the transport and registers every capability in declaration
    /// order.
    ///
    /// Each tool is announced, and only after the announcement resolves is it
    /// initialized. A failure is confined to its own tool. Calling `start`
    /// again while running returns the existing report.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Lifecycle`] when the server is closed and
    /// [`ServerError::Transport`] when the transport cannot be opened.
    pub async fn start(&mut self) -> ServerResult<RegistrationReport> {
        match self.lifecycle.state() {
            ServerState::Running => return Ok(self.report.clone()),
            ServerState::Closed => {
                self.lifecycle.transition(ServerEvent::Start)?;
            }
            ServerState::Created => {}
        }

        self.transport
            .open(&self.info, &self.capabilities)
            .await?;
        self.lifecycle.transition(ServerEvent::Start)?;
        info!(
            server = self.info.name(),
            version = self.info.version(),
            tools = self.pending.len(),
            "registering tools"
        );

        let pending = std::mem::take(&mut self.pending);
        for capability in pending {
            let report = self.register(capability).await;
            self.report.tools.push(report);
        }

        info!(
            active = self.report.active_count(),
            total = self.report.tools.len(),
            "tool registration complete"
        );
        Ok(self.report.clone())
    }

    async fn register(&mut self, capability: BoxedCapability) -> ToolReport {
        let container = Arc::new(ToolContainer::new(capability, &self.executor));
        self.containers.push(Arc::clone(&container));
        let name = container.name().clone();

        let outcome = AssertUnwindSafe(announce_and_initialize(
            self.transport.as_ref(),
            &container,
            self.config,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            let reason = panic_message(&*payload);
            error!(tool = %name, %reason, "tool registration panicked");
            ToolOutcome::Panicked { reason }
        });

        ToolReport { name, outcome }
    }

    /// Shuts every tool down in registration order, then closes the
    /// transport and the executor.
    ///
    /// Failures are logged and never interrupt teardown. Calling `close`
    /// again does nothing.
    pub async fn close(&mut self) {
        if self.lifecycle.state().is_terminal() {
            return;
        }

        if !self.pending.is_empty() {
            debug!(
                count = self.pending.len(),
                "dropping capabilities that were never registered"
            );
            self.pending.clear();
        }

        for container in &self.containers {
            let name = container.name();
            match catch_unwind(AssertUnwindSafe(|| container.shutdown_once())) {
                Ok(Ok(())) => debug!(tool = %name, "tool shut down"),
                Ok(Err(err)) => warn!(tool = %name, error = %err, "tool shutdown failed"),
                Err(payload) => {
                    error!(tool = %name, reason = %panic_message(&*payload), "tool shutdown panicked");
                }
            }
        }

        if let Err(err) = self.transport.close().await {
            warn!(error = %err, "failed to close transport");
        }
        self.executor.close();

        if let Err(err) = self.lifecycle.transition(ServerEvent::Close) {
            warn!(error = %err, "unexpected lifecycle state during close");
        }
        info!(server = self.info.name(), "server closed");
    }
}

async fn announce_and_initialize(
    transport: &dyn ToolTransport,
    container: &Arc<ToolContainer>,
    config: RegistrationConfig,
) -> ToolOutcome {
    let name = container.name();
    let Some(descriptor) = container.tool_descriptor() else {
        warn!(tool = %name, "skipping tool without a descriptor");
        return ToolOutcome::Skipped;
    };

    let announce = transport.announce_tool(descriptor, container.handler());
    let announced = match config.announce_timeout() {
        Some(limit) => tokio::time::timeout(limit, announce)
            .await
            .unwrap_or(Err(TransportError::Timeout { limit })),
        None => announce.await,
    };
    if let Err(err) = announced {
        error!(tool = %name, error = %err, "failed to announce tool");
        return ToolOutcome::AnnounceFailed {
            reason: err.to_string(),
        };
    }
    info!(tool = %name, strategy = ?container.strategy(), "tool announced");

    match container.initialize_once() {
        Ok(()) => {
            info!(tool = %name, "tool initialized");
            ToolOutcome::Active
        }
        Err(err) => {
            error!(tool = %name, error = %err, "tool initialization failed");
            ToolOutcome::InitializationFailed {
                reason: err.to_string(),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Builder for [`McpServer`].
#[derive(Default)]
pub struct McpServerBuilder {
    name: Option<String>,
    version: Option<String>,
    transport: Option<Arc<dyn ToolTransport>>,
    executor: Option<Executor>,
    capabilities: Option<ServerCapabilities>,
    config: RegistrationConfig,
    tools: Vec<BoxedCapability>,
}

impl fmt::Debug for McpServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServerBuilder")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("transport", &self.transport.is_some())
            .field("config", &self.config)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl McpServerBuilder {
    /// Sets the advertised server name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the advertised server version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the transport tools are announced to.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn ToolTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the default executor. Defaults to an unbounded executor on the
    /// current runtime.
    #[must_use]
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Overrides the declared capability classes.
    #[must_use]
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Sets the registration configuration.
    #[must_use]
    pub fn config(mut self, config: RegistrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a capability; registration follows call order.
    #[must_use]
    pub fn tool(mut self, capability: impl Into<BoxedCapability>) -> Self {
        self.tools.push(capability.into());
        self
    }

    /// Appends several capabilities.
    #[must_use]
    pub fn tools<I>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = BoxedCapability>,
    {
        self.tools.extend(capabilities);
        self
    }

    /// Builds the server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MissingTransport`] without a transport,
    /// [`ServerError::Metadata`] for a blank name or version,
    /// [`ServerError::InvalidConfig`] for an invalid configuration, and
    /// [`ServerError::Executor`] when no executor was given and no runtime is
    /// available.
    pub fn build(self) -> ServerResult<McpServer> {
        let transport = self.transport.ok_or(ServerError::MissingTransport)?;
        self.config.validate()?;

        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_owned());
        let version = self
            .version
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_owned());
        let info = ServerInfo::new(name, version)?;
        let executor = match self.executor {
            Some(executor) => executor,
            None => Executor::current()?,
        };

        Ok(McpServer {
            lifecycle: ServerLifecycle::new(info.name()),
            info,
            capabilities: self
                .capabilities
                .unwrap_or_else(ServerCapabilities::bridge_defaults),
            transport,
            executor,
            config: self.config,
            pending: self.tools,
            containers: Vec::new(),
            report: RegistrationReport::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ToolRouter;

    #[test]
    fn config_rejects_zero_timeout() {
        assert!(RegistrationConfig::default().validate().is_ok());
        assert!(RegistrationConfig::new(None).validate().is_ok());
        assert!(matches!(
            RegistrationConfig::new(Some(Duration::ZERO)).validate(),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn builder_requires_transport() {
        let err = McpServer::builder().build().unwrap_err();
        assert!(matches!(err, ServerError::MissingTransport));
    }

    #[tokio::test]
    async fn builder_rejects_blank_name() {
        let err = McpServer::builder()
            .name("  ")
            .transport(Arc::new(ToolRouter::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ServerError::Metadata(_)));
    }

    #[tokio::test]
    async fn start_and_close_are_idempotent() {
        let router = Arc::new(ToolRouter::new());
        let mut server = McpServer::builder()
            .name("umcp")
            .version("1.0.0")
            .transport(router.clone())
            .build()
            .unwrap();

        assert_eq!(server.state(), ServerState::Created);
        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();
        assert_eq!(first, second);
        assert!(server.state().is_running());
        assert_eq!(router.server_info(), Some(server.info().clone()));

        server.close().await;
        server.close().await;
        assert!(server.state().is_terminal());
        assert!(router.is_closed());
        assert!(server.executor().is_closed());
        assert!(matches!(
            server.start().await,
            Err(ServerError::Lifecycle(_))
        ));
    }
}
