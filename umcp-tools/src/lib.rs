//! Tool containers and JSON-schema synthesis.
//!
//! A [`ToolContainer`] turns one type-erased capability into something a
//! transport can announce and invoke: it derives the [`ToolDescriptor`],
//! shapes raw arguments into the capability's input, and owns the
//! exactly-once setup/teardown lifecycle.

#![warn(missing_docs, clippy::pedantic)]

pub mod container;
pub mod descriptor;
pub mod exchange;
pub mod result;
pub mod schema;

pub use container::{ContainerState, ToolContainer};
pub use descriptor::ToolDescriptor;
pub use exchange::{Arguments, Exchange, InvocationHandler};
pub use result::InvocationResult;
pub use schema::{JsonSchema, SchemaError, synthesize, try_synthesize};
