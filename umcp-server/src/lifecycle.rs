//! Server lifecycle state machine.

use thiserror::Error;
use tracing::debug;

/// States a server occupies during its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built; transport not yet opened.
    Created,
    /// Transport open and tools registered.
    Running,
    /// Tools shut down and transport closed; terminal.
    Closed,
}

impl ServerState {
    /// Returns `true` while the server is serving.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` once the server has closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Events that drive the server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// Open the transport and register tools.
    Start,
    /// Tear everything down.
    Close,
}

/// Lifecycle state manager.
#[derive(Debug, Clone)]
pub struct ServerLifecycle {
    server: String,
    state: ServerState,
}

impl ServerLifecycle {
    /// Creates a lifecycle for the named server.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            state: ServerState::Created,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// Repeating `Start` while running or `Close` once closed is allowed and
    /// leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when starting a closed
    /// server.
    pub fn transition(&mut self, event: ServerEvent) -> LifecycleResult<ServerState> {
        let next = match (self.state, event) {
            (ServerState::Created | ServerState::Running, ServerEvent::Start) => {
                ServerState::Running
            }
            (_, ServerEvent::Close) => ServerState::Closed,
            (ServerState::Closed, ServerEvent::Start) => {
                return Err(LifecycleError::InvalidTransition {
                    server: self.server.clone(),
                    from: self.state,
                    event,
                });
            }
        };

        if next != self.state {
            debug!(server = %self.server, from = ?self.state, to = ?next, ?event, "server lifecycle transition");
            self.state = next;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid lifecycle transition from {from:?} via {event:?} for server `{server}`")]
    InvalidTransition {
        /// Name of the server whose transition failed.
        server: String,
        /// State prior to the attempted transition.
        from: ServerState,
        /// Event that triggered the failure.
        event: ServerEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
