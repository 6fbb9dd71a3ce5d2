//! Structured response to one tool invocation.

use serde::{Deserialize, Serialize};

/// Content plus an error flag; the only thing remote callers ever receive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    content: String,
    is_error: bool,
}

impl InvocationResult {
    /// A successful result.
    #[must_use]
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed result; `content` is the message shown to the caller.
    #[must_use]
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Returns the textual content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns `true` for failures.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Consumes the result, returning its content.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}
