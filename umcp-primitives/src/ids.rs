//! Identifier attached to each tool invocation.

use std::fmt::{self, Display, Formatter};

use uuid::Uuid;

/// Tags the log lines of one invocation exchange.
///
/// Rendered in the compact 32-digit form so log lines stay short.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for InvocationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0.simple(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_invocation_gets_its_own_id() {
        assert_ne!(InvocationId::random(), InvocationId::random());
    }

    #[test]
    fn renders_without_hyphens() {
        let rendered = InvocationId::random().to_string();
        assert_eq!(rendered.len(), 32);
        assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
