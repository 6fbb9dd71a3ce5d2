//! Server identity and the protocol capability classes it declares.

use serde::{Deserialize, Serialize};

/// Name and version the server reports when a session opens.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    name: String,
    version: String,
}

impl ServerInfo {
    /// Creates server info after validating both fields.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCapability`] when the name or version is
    /// empty.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidCapability {
                reason: "server name cannot be empty".into(),
            });
        }
        let version = version.into();
        if version.trim().is_empty() {
            return Err(crate::Error::InvalidCapability {
                reason: "server version cannot be empty".into(),
            });
        }
        Ok(Self { name, version })
    }

    /// Returns the server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the server version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Resource support flags.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSupport {
    /// Clients may subscribe to resource updates.
    pub subscribe: bool,
    /// The server emits notifications when the resource list changes.
    pub list_changed: bool,
}

/// List-change notification flag shared by tools and prompts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSupport {
    /// The server emits notifications when the list changes.
    pub list_changed: bool,
}

/// Marker for logging support; serializes as `{}`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LoggingSupport {}

/// Capability classes declared when a session opens.
///
/// The bridge only declares these; their wire semantics belong to the
/// transport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Resource support, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSupport>,
    /// Tool support, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListSupport>,
    /// Prompt support, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListSupport>,
    /// Logging support, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSupport>,
}

impl ServerCapabilities {
    /// The set declared by the bridge: resources, tools, prompts and logging.
    #[must_use]
    pub const fn bridge_defaults() -> Self {
        Self {
            resources: Some(ResourceSupport {
                subscribe: true,
                list_changed: true,
            }),
            tools: Some(ListSupport { list_changed: true }),
            prompts: Some(ListSupport { list_changed: true }),
            logging: Some(LoggingSupport {}),
        }
    }
}
