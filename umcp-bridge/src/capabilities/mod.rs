//! Capabilities served by the bridge.

pub mod domain;
pub mod echo;
pub mod system;

use umcp_capability::BoxedCapability;

/// Builds every bundled capability in registration order.
pub fn all() -> umcp_primitives::Result<Vec<BoxedCapability>> {
    Ok(vec![
        echo::capability()?.into(),
        system::capability()?.into(),
        domain::capability()?.into(),
    ])
}
