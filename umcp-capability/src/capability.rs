//! Capability traits and the constructed capability value.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use umcp_primitives::{
    CapabilityError, CapabilityInfo, CapabilityInfoBuilder, CapabilityResult, InputType,
    TypeDescriptor,
};

use crate::executor::{Executor, ExecutorError, panic_message};

/// Setup and teardown hooks shared by every capability.
///
/// Both hooks default to no-ops. `shutdown` may run without a prior
/// `initialize`, so implementations must tolerate missing setup state.
pub trait Lifecycle: Send + Sync {
    /// Acquires resources. Called at most once, after the tool is announced.
    ///
    /// # Errors
    ///
    /// A failure is logged by the registry; the tool stays announced.
    fn initialize(&self) -> CapabilityResult<()> {
        Ok(())
    }

    /// Releases resources. Called at most once, during teardown.
    ///
    /// # Errors
    ///
    /// A failure is logged; teardown of other tools continues.
    fn shutdown(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

/// A capability whose body runs synchronously.
pub trait SyncCapability: Lifecycle + 'static {
    /// Input the body receives.
    type Input: Send + 'static;
    /// Output the body produces.
    type Output: Send + 'static;

    /// Runs the body.
    ///
    /// # Errors
    ///
    /// Returns a [`CapabilityError`] whose message is reported to the caller.
    fn execute(&self, input: Self::Input) -> CapabilityResult<Self::Output>;
}

/// A capability whose body is a future.
#[async_trait]
pub trait AsyncCapability: Lifecycle + 'static {
    /// Input the body receives.
    type Input: Send + 'static;
    /// Output the body produces.
    type Output: Send + 'static;

    /// Runs the body.
    ///
    /// # Errors
    ///
    /// Returns a [`CapabilityError`] whose message is reported to the caller.
    async fn execute(&self, input: Self::Input) -> CapabilityResult<Self::Output>;
}

/// Which execution form a capability implements natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Synchronous body; the async form runs it on the blocking pool.
    Direct,
    /// Future-returning body; the blocking form waits on the executor.
    Deferred,
}

/// Failure of one execution, before it is flattened for callers.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The body reported a failure.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    /// The body panicked or never ran.
    #[error("{0}")]
    Unexpected(String),
}

impl From<ExecutorError> for ExecutionError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Panicked(message) => Self::Unexpected(message),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<ExecutionError> for CapabilityError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Capability(err) => err,
            ExecutionError::Unexpected(detail) => Self::execution_failed(detail),
        }
    }
}

enum Body<I, O> {
    Direct(Arc<dyn SyncCapability<Input = I, Output = O>>),
    Deferred(Arc<dyn AsyncCapability<Input = I, Output = O>>),
}

impl<I, O> Body<I, O> {
    fn initialize(&self) -> CapabilityResult<()> {
        match self {
            Self::Direct(body) => body.initialize(),
            Self::Deferred(body) => body.initialize(),
        }
    }

    fn shutdown(&self) -> CapabilityResult<()> {
        match self {
            Self::Direct(body) => body.shutdown(),
            Self::Deferred(body) => body.shutdown(),
        }
    }

    const fn strategy(&self) -> ExecutionStrategy {
        match self {
            Self::Direct(_) => ExecutionStrategy::Direct,
            Self::Deferred(_) => ExecutionStrategy::Deferred,
        }
    }
}

/// A typed operation ready to be registered as a tool.
///
/// Built through [`Capability::sync`] or [`Capability::asynchronous`]; the
/// input descriptor, name and description are resolved at that point.
pub struct Capability<I, O> {
    info: CapabilityInfo,
    input: Option<TypeDescriptor>,
    executor: Option<Executor>,
    body: Body<I, O>,
}

impl<I, O> Capability<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Starts building a capability around a synchronous body.
    #[must_use]
    pub fn sync<C>(body: C) -> CapabilityBuilder<I, O>
    where
        C: SyncCapability<Input = I, Output = O>,
        I: InputType,
    {
        CapabilityBuilder::new(
            Body::Direct(Arc::new(body)),
            CapabilityInfoBuilder::build_for::<C>,
        )
    }

    /// Starts building a capability around an asynchronous body.
    #[must_use]
    pub fn asynchronous<C>(body: C) -> CapabilityBuilder<I, O>
    where
        C: AsyncCapability<Input = I, Output = O>,
        I: InputType,
    {
        CapabilityBuilder::new(
            Body::Deferred(Arc::new(body)),
            CapabilityInfoBuilder::build_for::<C>,
        )
    }

    /// Returns the resolved name and description.
    #[must_use]
    pub fn info(&self) -> &CapabilityInfo {
        &self.info
    }

    /// Returns the input descriptor, if one is known.
    #[must_use]
    pub fn input_descriptor(&self) -> Option<&TypeDescriptor> {
        self.input.as_ref()
    }

    /// Returns the capability's own executor, if it asked for one.
    #[must_use]
    pub fn executor_hint(&self) -> Option<&Executor> {
        self.executor.as_ref()
    }

    /// Picks the capability's own executor over `fallback`.
    #[must_use]
    pub fn resolve_executor<'a>(&'a self, fallback: &'a Executor) -> &'a Executor {
        self.executor.as_ref().unwrap_or(fallback)
    }

    /// Returns the natively implemented execution form.
    #[must_use]
    pub const fn strategy(&self) -> ExecutionStrategy {
        self.body.strategy()
    }

    /// Runs the setup hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's failure.
    pub fn initialize(&self) -> CapabilityResult<()> {
        self.body.initialize()
    }

    /// Runs the teardown hook.
    ///
    /// # Errors
    ///
    /// Propagates the hook's failure.
    pub fn shutdown(&self) -> CapabilityResult<()> {
        self.body.shutdown()
    }

    /// Executes and blocks the calling thread until the result is ready.
    ///
    /// `Direct` bodies run inline with panics caught. `Deferred` bodies are
    /// spawned on `executor` and awaited from this thread, which therefore
    /// must not be a current-thread runtime worker.
    ///
    /// # Errors
    ///
    /// A body's [`CapabilityError`] is returned unchanged; a panic, a closed
    /// executor or any other failure becomes "Execution failed".
    pub fn execute(&self, input: I, executor: &Executor) -> CapabilityResult<O> {
        match &self.body {
            Body::Direct(body) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| body.execute(input))).map_err(
                    |payload| CapabilityError::execution_failed(panic_message(&*payload)),
                )?
            }
            Body::Deferred(body) => {
                let body = Arc::clone(body);
                executor
                    .block_on(async move { body.execute(input).await })
                    .map_err(CapabilityError::execution_failed)?
            }
        }
    }

    /// Executes without blocking the caller.
    ///
    /// `Direct` bodies run on `executor`'s blocking pool; `Deferred` bodies
    /// are awaited in place.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_async(&self, input: I, executor: &Executor) -> CapabilityResult<O> {
        self.run(input, executor).await.map_err(Into::into)
    }

    /// Executes, keeping body failures apart from panics.
    pub(crate) async fn run(&self, input: I, executor: &Executor) -> Result<O, ExecutionError> {
        match &self.body {
            Body::Direct(body) => {
                let body = Arc::clone(body);
                Ok(executor.run_blocking(move || body.execute(input)).await??)
            }
            Body::Deferred(body) => AssertUnwindSafe(body.execute(input))
                .catch_unwind()
                .await
                .map_err(|payload| ExecutionError::Unexpected(panic_message(&*payload)))?
                .map_err(ExecutionError::Capability),
        }
    }
}

impl<I, O> fmt::Debug for Capability<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("info", &self.info)
            .field("input", &self.input)
            .field("strategy", &self.body.strategy())
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

/// Builder for [`Capability`].
pub struct CapabilityBuilder<I, O> {
    info: CapabilityInfoBuilder,
    resolve: fn(CapabilityInfoBuilder) -> umcp_primitives::Result<CapabilityInfo>,
    input: Option<TypeDescriptor>,
    executor: Option<Executor>,
    body: Body<I, O>,
}

impl<I, O> CapabilityBuilder<I, O>
where
    I: InputType,
{
    fn new(
        body: Body<I, O>,
        resolve: fn(CapabilityInfoBuilder) -> umcp_primitives::Result<CapabilityInfo>,
    ) -> Self {
        Self {
            info: CapabilityInfo::builder(),
            resolve,
            input: Some(I::describe()),
            executor: None,
            body,
        }
    }
}

impl<I, O> CapabilityBuilder<I, O> {
    /// Overrides the tool name.
    ///
    /// # Errors
    ///
    /// Returns [`umcp_primitives::Error::InvalidToolName`] if the name is not
    /// a valid tool name.
    pub fn name(mut self, name: impl Into<String>) -> umcp_primitives::Result<Self> {
        self.info = self.info.name(name)?;
        Ok(self)
    }

    /// Overrides the tool description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info = self.info.description(description);
        self
    }

    /// Runs this capability on its own executor instead of the registry's.
    #[must_use]
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replaces the input descriptor derived from the input type.
    ///
    /// `None` marks the input type as unknown; such a capability is never
    /// announced.
    #[must_use]
    pub fn input_descriptor(mut self, descriptor: Option<TypeDescriptor>) -> Self {
        self.input = descriptor;
        self
    }

    /// Resolves defaults and builds the capability.
    ///
    /// # Errors
    ///
    /// Returns [`umcp_primitives::Error::InvalidToolName`] when no name was
    /// given and the implementing type's name is not a valid tool name.
    pub fn build(self) -> umcp_primitives::Result<Capability<I, O>> {
        Ok(Capability {
            info: (self.resolve)(self.info)?,
            input: self.input,
            executor: self.executor,
            body: self.body,
        })
    }
}

impl<I, O> fmt::Debug for CapabilityBuilder<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBuilder")
            .field("info", &self.info)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use umcp_primitives::ScalarKind;

    struct Doubler;

    impl Lifecycle for Doubler {}

    impl SyncCapability for Doubler {
        type Input = i32;
        type Output = i32;

        fn execute(&self, input: i32) -> CapabilityResult<i32> {
            Ok(input * 2)
        }
    }

    struct Greeter {
        calls: AtomicUsize,
    }

    impl Lifecycle for Greeter {}

    #[async_trait]
    impl AsyncCapability for Greeter {
        type Input = String;
        type Output = String;

        async fn execute(&self, input: String) -> CapabilityResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.is_empty() {
                return Err(CapabilityError::new("empty name"));
            }
            tokio::task::yield_now().await;
            Ok(format!("hello {input}"))
        }
    }

    struct Panicker;

    impl Lifecycle for Panicker {}

    #[async_trait]
    impl AsyncCapability for Panicker {
        type Input = ();
        type Output = ();

        async fn execute(&self, _input: ()) -> CapabilityResult<()> {
            panic!("exploded")
        }
    }

    struct Divider;

    impl Lifecycle for Divider {}

    impl SyncCapability for Divider {
        type Input = i32;
        type Output = i32;

        fn execute(&self, input: i32) -> CapabilityResult<i32> {
            Ok(100 / input)
        }
    }

    #[test]
    fn defaults_resolve_from_implementing_type() {
        let capability = Capability::sync(Doubler).build().unwrap();

        assert_eq!(capability.info().name().as_str(), "Doubler");
        assert!(capability.info().description().ends_with("::Doubler"));
        assert_eq!(capability.strategy(), ExecutionStrategy::Direct);
        assert_eq!(
            capability.input_descriptor(),
            Some(&TypeDescriptor::scalar(ScalarKind::I32))
        );
    }

    #[test]
    fn builder_overrides_metadata() {
        let capability = Capability::sync(Doubler)
            .name("double")
            .unwrap()
            .description("Doubles a number")
            .input_descriptor(None)
            .build()
            .unwrap();

        assert_eq!(capability.info().name().as_str(), "double");
        assert_eq!(capability.info().description(), "Doubles a number");
        assert!(capability.input_descriptor().is_none());
    }

    #[test]
    fn invalid_name_is_rejected() {
        assert!(Capability::sync(Doubler).name("no spaces").is_err());
    }

    #[tokio::test]
    async fn direct_body_runs_through_async_form() {
        let executor = Executor::current().unwrap();
        let capability = Capability::sync(Doubler).build().unwrap();

        assert_eq!(capability.execute_async(21, &executor).await.unwrap(), 42);
        assert_eq!(capability.execute(4, &executor).unwrap(), 8);
    }

    #[test]
    fn deferred_body_runs_through_blocking_form() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let executor = Executor::new(runtime.handle().clone(), Default::default());
        let capability = Capability::asynchronous(Greeter {
            calls: AtomicUsize::new(0),
        })
        .build()
        .unwrap();

        assert_eq!(capability.strategy(), ExecutionStrategy::Deferred);
        assert_eq!(
            capability.execute("ada".into(), &executor).unwrap(),
            "hello ada"
        );
        let err = capability.execute(String::new(), &executor).unwrap_err();
        assert_eq!(err.message(), "empty name");
    }

    #[tokio::test]
    async fn capability_errors_pass_through_unchanged() {
        let executor = Executor::current().unwrap();
        let capability = Capability::asynchronous(Greeter {
            calls: AtomicUsize::new(0),
        })
        .build()
        .unwrap();

        let err = capability
            .execute_async(String::new(), &executor)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "empty name");
        assert!(!err.has_source());
    }

    #[tokio::test]
    async fn panics_become_execution_failures() {
        let executor = Executor::current().unwrap();
        let capability = Capability::asynchronous(Panicker).build().unwrap();

        let err = capability.execute_async((), &executor).await.unwrap_err();
        assert_eq!(err.message(), "Execution failed");
        assert!(err.has_source());
    }

    #[tokio::test]
    async fn direct_panics_fail_alike_in_both_forms() {
        let executor = Executor::current().unwrap();
        let capability = Capability::sync(Divider).build().unwrap();

        assert_eq!(capability.execute(4, &executor).unwrap(), 25);

        let blocking = capability.execute(0, &executor).unwrap_err();
        assert_eq!(blocking.message(), "Execution failed");
        assert_eq!(
            std::error::Error::source(&blocking).map(ToString::to_string),
            Some("attempt to divide by zero".to_owned())
        );

        let deferred = capability.execute_async(0, &executor).await.unwrap_err();
        assert_eq!(deferred.message(), "Execution failed");
        assert!(deferred.has_source());
    }

    #[tokio::test]
    async fn executor_hint_takes_precedence() {
        let registry_default = Executor::current().unwrap();
        let own = Executor::current().unwrap();
        own.close();

        let capability = Capability::sync(Doubler)
            .executor(own)
            .build()
            .unwrap();

        assert!(capability.resolve_executor(&registry_default).is_closed());
        let err = capability
            .execute_async(1, capability.resolve_executor(&registry_default))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Execution failed");
    }
}
