//! Capability contract for the uMCP bridge.
//!
//! A capability implements exactly one of [`SyncCapability`] or
//! [`AsyncCapability`]; [`Capability`] supplies the other execution form
//! through a fixed adapter running on an explicit [`Executor`].

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod erased;
mod executor;

pub use capability::{
    AsyncCapability, Capability, CapabilityBuilder, ExecutionError, ExecutionStrategy, Lifecycle,
    SyncCapability,
};
pub use erased::{BoxedCapability, CallError, ErasedCapability, render_output};
pub use executor::{Executor, ExecutorConfig, ExecutorError, ExecutorResult};

pub use async_trait::async_trait;
