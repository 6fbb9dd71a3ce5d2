//! Tool naming and capability metadata.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 64;

/// Name under which a capability is announced as a tool.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolName(String);

impl ToolName {
    /// Creates a tool name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolName`] if the name is empty, too long, or
    /// contains characters other than ASCII alphanumerics, dash, underscore
    /// or dot.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ToolName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ToolName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ToolName> for String {
    fn from(value: ToolName) -> Self {
        value.0
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidToolName {
            name: String::new(),
            reason: "name cannot be empty".into(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidToolName {
            name: name.into(),
            reason: format!("name length must be <= {MAX_NAME_LEN}"),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::InvalidToolName {
            name: name.into(),
            reason: "name must contain ASCII alphanumeric, dash, underscore, or dot".into(),
        });
    }

    Ok(())
}

/// Returns the last path segment of a type name, without generic arguments.
fn simple_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Display metadata resolved for a capability when it is constructed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    name: ToolName,
    description: String,
    type_name: String,
}

impl CapabilityInfo {
    /// Starts building capability metadata.
    #[must_use]
    pub fn builder() -> CapabilityInfoBuilder {
        CapabilityInfoBuilder {
            name: None,
            description: None,
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

    /// Fully qualified name of the implementing type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Builder for [`CapabilityInfo`].
#[derive(Debug, Default)]
pub struct CapabilityInfoBuilder {
    name: Option<ToolName>,
    description: Option<String>,
}

impl CapabilityInfoBuilder {
    /// Sets an explicit tool name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolName`] if the name fails validation.
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        self.name = Some(ToolName::new(name)?);
        Ok(self)
    }

    /// Sets an explicit description. Blank descriptions are ignored.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    /// Finalises the metadata, defaulting missing fields from `T`.
    ///
    /// The name falls back to the simple name of `T` and the description to
    /// its fully qualified path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolName`] when no explicit name was supplied
    /// and the simple name of `T` is not a valid tool name.
    pub fn build_for<T: ?Sized>(self) -> Result<CapabilityInfo> {
        let type_name = std::any::type_name::<T>();
        let name = match self.name {
            Some(name) => name,
            None => ToolName::new(simple_type_name(type_name))?,
        };
        let description = self.description.unwrap_or_else(|| type_name.to_owned());

        Ok(CapabilityInfo {
            name,
            description,
            type_name: type_name.to_owned(),
        })
    }
}
