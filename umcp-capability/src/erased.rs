//! Type-erased view of a capability, as held by tool containers.

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use umcp_primitives::{CapabilityError, CapabilityInfo, CapabilityResult, TypeDescriptor};

use crate::capability::{Capability, ExecutionError, ExecutionStrategy};
use crate::executor::Executor;

/// Owned, type-erased capability.
pub type BoxedCapability = Box<dyn ErasedCapability>;

/// Why an erased call produced no output.
#[derive(Debug, Error)]
pub enum CallError {
    /// Arguments did not match the input type.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),
    /// The capability reported a failure.
    #[error(transparent)]
    Capability(CapabilityError),
    /// The capability panicked, never ran, or its output could not be rendered.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<ExecutionError> for CallError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Capability(err) => Self::Capability(err),
            ExecutionError::Unexpected(detail) => Self::Unexpected(detail),
        }
    }
}

/// A capability with its input and output types hidden behind JSON.
pub trait ErasedCapability: Send + Sync {
    /// Resolved name and description.
    fn info(&self) -> &CapabilityInfo;

    /// Input descriptor, when the input type is known.
    fn input_descriptor(&self) -> Option<&TypeDescriptor>;

    /// Executor the capability wants instead of the registry default.
    fn executor_hint(&self) -> Option<&Executor>;

    /// Natively implemented execution form.
    fn strategy(&self) -> ExecutionStrategy;

    /// Runs the setup hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's failure.
    fn initialize(&self) -> CapabilityResult<()>;

    /// Runs the teardown hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's failure.
    fn shutdown(&self) -> CapabilityResult<()>;

    /// Decodes `arguments`, executes on `executor` and renders the output.
    fn call<'a>(
        &'a self,
        arguments: Value,
        executor: &'a Executor,
    ) -> BoxFuture<'a, Result<String, CallError>>;
}

impl<I, O> ErasedCapability for Capability<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn info(&self) -> &CapabilityInfo {
        Capability::info(self)
    }

    fn input_descriptor(&self) -> Option<&TypeDescriptor> {
        Capability::input_descriptor(self)
    }

    fn executor_hint(&self) -> Option<&Executor> {
        Capability::executor_hint(self)
    }

    fn strategy(&self) -> ExecutionStrategy {
        Capability::strategy(self)
    }

    fn initialize(&self) -> CapabilityResult<()> {
        Capability::initialize(self)
    }

    fn shutdown(&self) -> CapabilityResult<()> {
        Capability::shutdown(self)
    }

    fn call<'a>(
        &'a self,
        arguments: Value,
        executor: &'a Executor,
    ) -> BoxFuture<'a, Result<String, CallError>> {
        Box::pin(async move {
            let input: I = serde_json::from_value(arguments).map_err(CallError::InvalidArguments)?;
            let output = self.run(input, executor).await?;
            render_output(&output)
                .map_err(|err| CallError::Unexpected(format!("failed to render output: {err}")))
        })
    }
}

impl<I, O> From<Capability<I, O>> for BoxedCapability
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn from(capability: Capability<I, O>) -> Self {
        Box::new(capability)
    }
}

/// Renders an output as tool content.
///
/// Strings are emitted as-is; every other value as compact JSON.
///
/// # Errors
///
/// Returns the serializer's error when `output` cannot be represented as JSON.
pub fn render_output<O: Serialize + ?Sized>(output: &O) -> serde_json::Result<String> {
    Ok(match serde_json::to_value(output)? {
        Value::String(text) => text,
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Lifecycle, SyncCapability};
    use serde::Deserialize;
    use serde_json::json;
    use umcp_primitives::InputType;

    #[derive(Deserialize, InputType)]
    struct Pair {
        left: i64,
        right: i64,
    }

    #[derive(Serialize)]
    struct Sum {
        total: i64,
    }

    struct Adder;

    impl Lifecycle for Adder {}

    impl SyncCapability for Adder {
        type Input = Pair;
        type Output = Sum;

        fn execute(&self, input: Pair) -> CapabilityResult<Sum> {
            input
                .left
                .checked_add(input.right)
                .map(|total| Sum { total })
                .ok_or_else(|| CapabilityError::new("overflow"))
        }
    }

    fn adder() -> BoxedCapability {
        Capability::sync(Adder).build().unwrap().into()
    }

    #[tokio::test]
    async fn call_renders_structured_output_as_json() {
        let executor = Executor::current().unwrap();
        let output = adder()
            .call(json!({"left": 2, "right": 3}), &executor)
            .await
            .unwrap();
        assert_eq!(output, r#"{"total":5}"#);
    }

    #[tokio::test]
    async fn call_reports_bad_arguments() {
        let executor = Executor::current().unwrap();
        let err = adder()
            .call(json!({"left": "two"}), &executor)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidArguments(_)));
        assert!(err.to_string().starts_with("Invalid arguments: "));
    }

    #[tokio::test]
    async fn call_keeps_capability_errors() {
        let executor = Executor::current().unwrap();
        let err = adder()
            .call(json!({"left": i64::MAX, "right": 1}), &executor)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "overflow");
    }

    #[test]
    fn strings_render_unquoted() {
        assert_eq!(render_output("Echo: hi").unwrap(), "Echo: hi");
        assert_eq!(render_output(&42).unwrap(), "42");
        assert_eq!(render_output(&()).unwrap(), "null");
    }
}
