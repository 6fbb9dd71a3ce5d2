//! Per-request context and the handler signature announced to transports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use umcp_primitives::InvocationId;

use crate::result::InvocationResult;

/// Raw argument mapping supplied by a remote caller.
pub type Arguments = Map<String, Value>;

/// Closure a transport calls for each invocation of one tool.
pub type InvocationHandler =
    Arc<dyn Fn(Exchange, Option<Arguments>) -> BoxFuture<'static, InvocationResult> + Send + Sync>;

/// Context of one request/response exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    id: InvocationId,
    received_at: Instant,
    session: Option<String>,
}

impl Exchange {
    /// Creates an exchange received now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: InvocationId::random(),
            received_at: Instant::now(),
            session: None,
        }
    }

    /// Tags the exchange with the caller's session.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Returns the invocation identifier.
    #[must_use]
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Returns when the request arrived.
    #[must_use]
    pub const fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Returns the caller's session, if known.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Time spent since the request arrived.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}
