//! Tool registry, registration pipeline and transports for the uMCP bridge.
//!
//! [`McpServer`] owns the ordered set of tool containers. `start` announces
//! each tool on the [`ToolTransport`] and initializes it only once the
//! announcement resolves; `close` tears everything down in the same order.
//! [`ToolRouter`] is the in-process transport and [`Dispatcher`] exposes it
//! over line-delimited JSON-RPC.

#![warn(missing_docs, clippy::pedantic)]

pub mod dispatch;
mod lifecycle;
mod server;
mod transport;

pub use dispatch::{Dispatcher, serve_lines};
pub use lifecycle::{LifecycleError, LifecycleResult, ServerEvent, ServerLifecycle, ServerState};
pub use server::{
    McpServer, McpServerBuilder, RegistrationConfig, RegistrationReport, ServerError,
    ServerResult, ToolOutcome, ToolReport,
};
pub use transport::{ToolRouter, ToolTransport, TransportError, TransportResult};
