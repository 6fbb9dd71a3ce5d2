//! Core shared types and traits for the uMCP capability bridge.

#![warn(missing_docs, clippy::pedantic)]

// Lets `#[derive(InputType)]` expand to `::umcp_primitives::...` inside this crate.
extern crate self as umcp_primitives;

mod capability;
mod descriptor;
mod error;
mod ids;
mod manifest;

/// Tool naming and capability metadata.
pub use capability::{CapabilityInfo, CapabilityInfoBuilder, ToolName};
/// Type descriptors standing in for runtime reflection over capability inputs.
pub use descriptor::{
    FieldDescriptor, InputType, RecordDescriptor, ScalarKind, TypeDescriptor,
};
/// Error types and result aliases shared across the workspace.
pub use error::{CapabilityError, CapabilityResult, Error, Result};
/// Identifier attached to every tool invocation.
pub use ids::InvocationId;
/// Server identity and the protocol capability classes it declares.
pub use manifest::{ServerCapabilities, ServerInfo};
/// Derives [`InputType`] for records and unit-only enums.
pub use umcp_macros::InputType;
