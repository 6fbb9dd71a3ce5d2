//! uMCP capability bridge facade.
//!
//! Depend on this crate via `cargo add umcp`. It bundles the bridge crates
//! behind feature flags; `server` pulls in `tools`, which pulls in
//! `capability`.

#![warn(missing_docs, clippy::pedantic)]

/// Shared primitives: errors, tool names, type descriptors.
pub use umcp_primitives as primitives;

/// Capability traits and the executor (enabled by `capability` feature).
#[cfg(feature = "capability")]
pub use umcp_capability as capability;

/// Schema synthesis and tool containers (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use umcp_tools as tools;

/// Registration pipeline, router and JSON-RPC dispatch (enabled by `server` feature).
#[cfg(feature = "server")]
pub use umcp_server as server;

/// Items most capability authors need.
pub mod prelude {
    pub use umcp_primitives::{CapabilityError, CapabilityResult, InputType};

    #[cfg(feature = "capability")]
    pub use umcp_capability::{
        AsyncCapability, Capability, Executor, Lifecycle, SyncCapability, async_trait,
    };

    #[cfg(feature = "server")]
    pub use umcp_server::{McpServer, RegistrationConfig, ToolRouter};
}
