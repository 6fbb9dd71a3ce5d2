//! Lifecycle- and invocation-owning wrapper around one capability.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use umcp_capability::{BoxedCapability, CallError, ExecutionStrategy, Executor};
use umcp_primitives::{CapabilityResult, ToolName, TypeDescriptor};

use crate::descriptor::ToolDescriptor;
use crate::exchange::{Arguments, Exchange, InvocationHandler};
use crate::result::InvocationResult;
use crate::schema::{VALUE_PROPERTY, synthesize, wire_arguments, wrapped_scalar};

/// Failure content when a scalar argument is missing.
pub const MISSING_VALUE: &str = "Missing value property for primitive type";
/// Failure content when a structured input receives no arguments.
pub const ARGUMENTS_REQUIRED: &str = "Arguments are required for this tool";

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Setup has not run, or it failed.
    Uninitialized,
    /// Setup succeeded.
    Initialized,
    /// Teardown ran; terminal.
    ShutDown,
}

/// Owns one capability and guarantees exactly-once setup and teardown.
pub struct ToolContainer {
    capability: BoxedCapability,
    executor: Executor,
    state: Mutex<ContainerState>,
    closed: AtomicBool,
}

impl ToolContainer {
    /// Wraps `capability`, running it on its own executor if it names one and
    /// on `default_executor` otherwise.
    #[must_use]
    pub fn new(capability: impl Into<BoxedCapability>, default_executor: &Executor) -> Self {
        let capability = capability.into();
        let executor = capability
            .executor_hint()
            .unwrap_or(default_executor)
            .clone();
        Self {
            capability,
            executor,
            state: Mutex::new(ContainerState::Uninitialized),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &ToolName {
        self.capability.info().name()
    }

    /// Returns the capability's native execution form.
    #[must_use]
    pub fn strategy(&self) -> ExecutionStrategy {
        self.capability.strategy()
    }

    /// Returns the executor invocations run on.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContainerState {
        *self.lock_state()
    }

    /// Derives the announced descriptor without touching the lifecycle.
    ///
    /// Returns `None`, and logs, when the capability's input type is unknown.
    #[must_use]
    pub fn tool_descriptor(&self) -> Option<ToolDescriptor> {
        let info = self.capability.info();
        let Some(input) = self.capability.input_descriptor() else {
            error!(tool = %info.name(), "input type is unknown; tool cannot be described");
            return None;
        };

        Some(ToolDescriptor::new(
            info.name().clone(),
            info.description(),
            synthesize(input),
        ))
    }

    /// Runs the capability's setup at most once.
    ///
    /// A failed setup leaves the container uninitialized so a later call can
    /// retry. After shutdown this is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates the setup failure.
    pub fn initialize_once(&self) -> CapabilityResult<()> {
        let mut state = self.lock_state();
        match *state {
            ContainerState::Initialized => Ok(()),
            ContainerState::ShutDown => {
                warn!(tool = %self.name(), "initialize requested after shutdown; ignoring");
                Ok(())
            }
            ContainerState::Uninitialized => {
                self.capability.initialize()?;
                *state = ContainerState::Initialized;
                debug!(tool = %self.name(), state = ?*state, "tool initialized");
                Ok(())
            }
        }
    }

    /// Runs the capability's teardown at most once, whether or not setup ran.
    ///
    /// The container is shut down afterwards even if teardown fails.
    ///
    /// # Errors
    ///
    /// Propagates the teardown failure.
    pub fn shutdown_once(&self) -> CapabilityResult<()> {
        let mut state = self.lock_state();
        if *state == ContainerState::ShutDown {
            return Ok(());
        }

        let previous = *state;
        *state = ContainerState::ShutDown;
        self.closed.store(true, Ordering::Release);
        debug!(tool = %self.name(), ?previous, "shutting tool down");
        self.capability.shutdown()
    }

    /// Invokes the capability with raw arguments.
    ///
    /// Every failure is reported as a failed [`InvocationResult`]; this never
    /// panics or returns early.
    pub async fn invoke(&self, exchange: Exchange, arguments: Option<Arguments>) -> InvocationResult {
        let name = self.name();
        if self.closed.load(Ordering::Acquire) {
            return InvocationResult::failure(format!("Tool `{name}` has been shut down"));
        }

        let input = match self.input_value(arguments) {
            Ok(input) => input,
            Err(message) => {
                warn!(tool = %name, invocation = %exchange.id(), reason = message, "rejected tool arguments");
                return InvocationResult::failure(message);
            }
        };

        let outcome = AssertUnwindSafe(self.capability.call(input, &self.executor))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(CallError::Unexpected(panic_message(&*payload))));

        let elapsed_ms = u64::try_from(exchange.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(content) => {
                info!(tool = %name, invocation = %exchange.id(), elapsed_ms, "tool invocation succeeded");
                InvocationResult::success(content)
            }
            Err(CallError::Capability(err)) => {
                warn!(tool = %name, invocation = %exchange.id(), elapsed_ms, error = %err, "tool reported an error");
                InvocationResult::failure(err.message())
            }
            Err(err @ CallError::InvalidArguments(_)) => {
                warn!(tool = %name, invocation = %exchange.id(), error = %err, "arguments did not match input type");
                InvocationResult::failure(err.to_string())
            }
            Err(err @ CallError::Unexpected(_)) => {
                error!(tool = %name, invocation = %exchange.id(), elapsed_ms, error = %err, "tool invocation failed");
                InvocationResult::failure(err.to_string())
            }
        }
    }

    /// Returns the handler announced to the transport for this tool.
    #[must_use]
    pub fn handler(self: &Arc<Self>) -> InvocationHandler {
        let container = Arc::clone(self);
        Arc::new(move |exchange: Exchange, arguments: Option<Arguments>| {
            let container = Arc::clone(&container);
            async move { container.invoke(exchange, arguments).await }.boxed()
        })
    }

    /// Shapes raw arguments into the value the input type deserializes from.
    fn input_value(&self, arguments: Option<Arguments>) -> Result<Value, &'static str> {
        let descriptor = self.capability.input_descriptor();

        if let Some((scalar, optional)) = descriptor.and_then(wrapped_scalar) {
            let value = arguments.and_then(|mut arguments| {
                arguments
                    .remove(VALUE_PROPERTY)
                    .or_else(|| arguments.remove(scalar.name()))
            });
            return match value {
                Some(value) => Ok(value),
                None if optional => Ok(Value::Null),
                None => Err(MISSING_VALUE),
            };
        }

        match (descriptor, arguments) {
            (Some(TypeDescriptor::Unit), _) => Ok(Value::Null),
            (Some(TypeDescriptor::Optional { .. }), None) => Ok(Value::Null),
            (Some(descriptor), Some(arguments)) => {
                let mut value = Value::Object(arguments);
                wire_arguments(descriptor, &mut value);
                Ok(value)
            }
            (None, Some(arguments)) => Ok(Value::Object(arguments)),
            (_, None) => Err(ARGUMENTS_REQUIRED),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ContainerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ToolContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContainer")
            .field("name", self.name())
            .field("strategy", &self.strategy())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "capability panicked".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use umcp_capability::{AsyncCapability, Capability, Lifecycle, SyncCapability, async_trait};
    use umcp_primitives::{CapabilityError, InputType};

    #[derive(Default)]
    struct Counters {
        initialized: AtomicUsize,
        shut_down: AtomicUsize,
        fail_first_init: AtomicBool,
    }

    struct Square {
        counters: Arc<Counters>,
    }

    impl Lifecycle for Square {
        fn initialize(&self) -> CapabilityResult<()> {
            if self.counters.fail_first_init.swap(false, Ordering::SeqCst) {
                return Err(CapabilityError::new("not yet"));
            }
            self.counters.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn shutdown(&self) -> CapabilityResult<()> {
            self.counters.shut_down.fetch_add(1, Ordering::SeqCst);
            Err(CapabilityError::new("teardown noise"))
        }
    }

    impl SyncCapability for Square {
        type Input = i32;
        type Output = i64;

        fn execute(&self, input: i32) -> CapabilityResult<i64> {
            Ok(i64::from(input) * i64::from(input))
        }
    }

    #[derive(Deserialize, InputType)]
    struct EchoInput {
        message: String,
    }

    #[derive(Serialize)]
    struct EchoOutput {
        result: String,
    }

    struct Echo;

    impl Lifecycle for Echo {}

    #[async_trait]
    impl AsyncCapability for Echo {
        type Input = EchoInput;
        type Output = EchoOutput;

        async fn execute(&self, input: EchoInput) -> CapabilityResult<EchoOutput> {
            match input.message.as_str() {
                "boom" => Err(CapabilityError::new("boom")),
                "panic" => panic!("echo exploded"),
                _ => Ok(EchoOutput {
                    result: format!("Echo: {}", input.message),
                }),
            }
        }
    }

    #[derive(Deserialize, InputType)]
    struct WhoisQuery {
        domain_name: String,
        max_results: Option<i32>,
        #[serde(rename = "server")]
        whois_server: Option<String>,
        referred_by: Option<Referrer>,
    }

    #[derive(Deserialize, InputType)]
    struct Referrer {
        contact_email: String,
    }

    struct Whois;

    impl Lifecycle for Whois {}

    impl SyncCapability for Whois {
        type Input = WhoisQuery;
        type Output = String;

        fn execute(&self, input: WhoisQuery) -> CapabilityResult<String> {
            Ok(format!(
                "{} via {} (limit {}, referred by {})",
                input.domain_name,
                input.whois_server.as_deref().unwrap_or("default"),
                input.max_results.unwrap_or(10),
                input
                    .referred_by
                    .map_or_else(|| "nobody".to_owned(), |referrer| referrer.contact_email),
            ))
        }
    }

    struct Uptime {
        calls: Arc<AtomicUsize>,
    }

    impl Lifecycle for Uptime {}

    impl SyncCapability for Uptime {
        type Input = ();
        type Output = String;

        fn execute(&self, (): ()) -> CapabilityResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("up".into())
        }
    }

    fn square(counters: &Arc<Counters>) -> ToolContainer {
        let capability = Capability::sync(Square {
            counters: Arc::clone(counters),
        })
        .name("square")
        .unwrap()
        .build()
        .unwrap();
        ToolContainer::new(capability, &Executor::current().unwrap())
    }

    fn echo() -> ToolContainer {
        let capability = Capability::asynchronous(Echo)
            .name("echo")
            .unwrap()
            .description("Echoes a message")
            .build()
            .unwrap();
        ToolContainer::new(capability, &Executor::current().unwrap())
    }

    fn args(value: serde_json::Value) -> Option<Arguments> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[tokio::test]
    async fn lifecycle_hooks_run_exactly_once() {
        let counters = Arc::new(Counters::default());
        let container = square(&counters);

        for _ in 0..3 {
            container.initialize_once().unwrap();
        }
        assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(container.state(), ContainerState::Initialized);

        assert!(container.shutdown_once().is_err());
        for _ in 0..3 {
            container.shutdown_once().unwrap();
        }
        assert_eq!(counters.shut_down.load(Ordering::SeqCst), 1);
        assert_eq!(container.state(), ContainerState::ShutDown);
    }

    #[tokio::test]
    async fn failed_initialization_can_be_retried() {
        let counters = Arc::new(Counters::default());
        counters.fail_first_init.store(true, Ordering::SeqCst);
        let container = square(&counters);

        assert_eq!(container.initialize_once().unwrap_err().message(), "not yet");
        assert_eq!(container.state(), ContainerState::Uninitialized);

        container.initialize_once().unwrap();
        assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_without_initialize_still_tears_down() {
        let counters = Arc::new(Counters::default());
        let container = square(&counters);

        let _ = container.shutdown_once();
        container.initialize_once().unwrap();

        assert_eq!(counters.shut_down.load(Ordering::SeqCst), 1);
        assert_eq!(counters.initialized.load(Ordering::SeqCst), 0);
        assert_eq!(container.state(), ContainerState::ShutDown);
    }

    #[tokio::test]
    async fn scalar_arguments_are_unwrapped() {
        let container = square(&Arc::new(Counters::default()));

        let result = container
            .invoke(Exchange::new(), args(json!({"value": 5})))
            .await;
        assert_eq!(result, InvocationResult::success("25"));

        let result = container
            .invoke(Exchange::new(), args(json!({"i32": 3})))
            .await;
        assert_eq!(result, InvocationResult::success("9"));
    }

    #[tokio::test]
    async fn missing_scalar_is_reported() {
        let container = square(&Arc::new(Counters::default()));

        for arguments in [None, args(json!({"other": 1}))] {
            let result = container.invoke(Exchange::new(), arguments).await;
            assert_eq!(result, InvocationResult::failure(MISSING_VALUE));
        }
    }

    #[tokio::test]
    async fn unit_input_ignores_arguments() {
        let calls = Arc::new(AtomicUsize::new(0));
        let capability = Capability::sync(Uptime {
            calls: Arc::clone(&calls),
        })
        .build()
        .unwrap();
        let container = ToolContainer::new(capability, &Executor::current().unwrap());

        assert_eq!(
            container.invoke(Exchange::new(), None).await,
            InvocationResult::success("up")
        );
        assert_eq!(
            container
                .invoke(Exchange::new(), args(json!({"ignored": true})))
                .await,
            InvocationResult::success("up")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn structured_input_round_trip() {
        let container = echo();

        let descriptor = container.tool_descriptor().unwrap();
        assert_eq!(descriptor.name().as_str(), "echo");
        assert_eq!(descriptor.input_schema().required(), ["message"]);
        assert_eq!(
            descriptor.input_schema().to_value()["properties"]["message"],
            json!({"type": "string"})
        );

        let result = container
            .invoke(Exchange::new(), args(json!({"message": "hi"})))
            .await;
        assert!(!result.is_error());
        assert_eq!(result.content(), r#"{"result":"Echo: hi"}"#);
    }

    #[tokio::test]
    async fn snake_case_fields_accept_schema_names() {
        let capability = Capability::sync(Whois).name("whois").unwrap().build().unwrap();
        let container = ToolContainer::new(capability, &Executor::current().unwrap());

        let descriptor = container.tool_descriptor().unwrap();
        let properties: Vec<_> = descriptor.input_schema().property_names().collect();
        assert_eq!(properties, ["domainName", "maxResults", "server", "referredBy"]);
        assert_eq!(descriptor.input_schema().required(), ["domainName"]);

        let result = container
            .invoke(
                Exchange::new(),
                args(json!({
                    "domainName": "example.com",
                    "maxResults": 3,
                    "server": "whois.example",
                    "referredBy": {"contactEmail": "ops@example.com"},
                })),
            )
            .await;
        assert_eq!(
            result,
            InvocationResult::success("example.com via whois.example (limit 3, referred by ops@example.com)")
        );

        let result = container
            .invoke(Exchange::new(), args(json!({"domain_name": "example.org"})))
            .await;
        assert_eq!(
            result,
            InvocationResult::success("example.org via default (limit 10, referred by nobody)")
        );
    }

    #[tokio::test]
    async fn structured_input_failures() {
        let container = echo();

        assert_eq!(
            container.invoke(Exchange::new(), None).await,
            InvocationResult::failure(ARGUMENTS_REQUIRED)
        );

        let invalid = container
            .invoke(Exchange::new(), args(json!({"message": 7})))
            .await;
        assert!(invalid.is_error());
        assert!(invalid.content().starts_with("Invalid arguments: "));

        assert_eq!(
            container
                .invoke(Exchange::new(), args(json!({"message": "boom"})))
                .await,
            InvocationResult::failure("boom")
        );

        let panicked = container
            .invoke(Exchange::new(), args(json!({"message": "panic"})))
            .await;
        assert!(panicked.is_error());
        assert_eq!(panicked.content(), "Unexpected error: echo exploded");
    }

    #[tokio::test]
    async fn shut_down_container_refuses_calls() {
        let container = echo();
        container.shutdown_once().unwrap();

        assert_eq!(
            container
                .invoke(Exchange::new(), args(json!({"message": "hi"})))
                .await,
            InvocationResult::failure("Tool `echo` has been shut down")
        );
    }

    #[tokio::test]
    async fn unknown_input_type_yields_no_descriptor() {
        let capability = Capability::asynchronous(Echo)
            .input_descriptor(None)
            .build()
            .unwrap();
        let container = ToolContainer::new(capability, &Executor::current().unwrap());

        assert!(container.tool_descriptor().is_none());
        assert_eq!(container.state(), ContainerState::Uninitialized);
    }

    #[tokio::test]
    async fn handler_delegates_to_invoke() {
        let container = Arc::new(echo());
        let handler = container.handler();

        let result = handler(Exchange::new(), args(json!({"message": "via handler"}))).await;
        assert_eq!(result.content(), r#"{"result":"Echo: via handler"}"#);
    }
}
