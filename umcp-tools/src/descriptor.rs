//! Externally visible tool metadata.

use serde::Serialize;
use umcp_primitives::ToolName;

use crate::schema::JsonSchema;

/// The `{name, description, inputSchema}` triple announced for a tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    name: ToolName,
    description: String,
    input_schema: JsonSchema,
}

impl ToolDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: ToolName, description: impl Into<String>, input_schema: JsonSchema) -> Self {
        Self {
            name,
            description: description.into(),
            input_schema,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &ToolName {
        &self.name
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the input schema.
    #[must_use]
    pub fn input_schema(&self) -> &JsonSchema {
        &self.input_schema
    }
}
