use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use umcp_capability::{AsyncCapability, Capability, Lifecycle};
use umcp_primitives::{CapabilityResult, InputType};

#[derive(Debug, Deserialize, InputType)]
#[serde(rename_all = "camelCase")]
pub struct EchoInput {
    /// Text to send back.
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EchoOutput {
    pub result: String,
}

pub struct Echo;

impl Lifecycle for Echo {}

#[async_trait]
impl AsyncCapability for Echo {
    type Input = EchoInput;
    type Output = EchoOutput;

    async fn execute(&self, input: EchoInput) -> CapabilityResult<EchoOutput> {
        Ok(EchoOutput {
            result: format!("Echo: {}", input.message),
        })
    }
}

pub fn capability() -> umcp_primitives::Result<Capability<EchoInput, EchoOutput>> {
    Capability::asynchronous(Echo)
        .name("echo")?
        .description("Echoes the message back")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use umcp_capability::Executor;

    #[tokio::test]
    async fn echoes_with_prefix() {
        let echo = capability().unwrap();
        let output = echo
            .execute_async(
                EchoInput {
                    message: "hello".into(),
                },
                &Executor::current().unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(output.result, "Echo: hello");
    }
}
