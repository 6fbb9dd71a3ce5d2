//! Domain availability lookups over WHOIS (RFC 3912).

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};
use umcp_capability::{AsyncCapability, Capability, Lifecycle};
use umcp_primitives::{CapabilityError, CapabilityResult};

/// Registry queried by default.
pub const DEFAULT_WHOIS_SERVER: &str = "whois.internic.net:43";

const NO_MATCH: &str = "No match for";
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks whether a domain name is still free to register.
#[derive(Debug, Clone)]
pub struct DomainAvailability {
    server: String,
}

impl DomainAvailability {
    /// Creates a checker that queries `server` (`host:port`).
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    async fn whois(&self, domain: &str) -> CapabilityResult<String> {
        let lookup = async {
            let mut stream = TcpStream::connect(&self.server).await?;
            stream.write_all(format!("={domain}\r\n").as_bytes()).await?;
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await?;
            Ok::<_, std::io::Error>(reply)
        };

        let reply = timeout(QUERY_TIMEOUT, lookup)
            .await
            .map_err(|elapsed| CapabilityError::with_source("WHOIS query timed out", elapsed))?
            .map_err(|err| CapabilityError::with_source("I/O error during WHOIS query", err))?;
        debug!(domain, bytes = reply.len(), "WHOIS reply received");
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

impl Default for DomainAvailability {
    fn default() -> Self {
        Self::new(DEFAULT_WHOIS_SERVER)
    }
}

impl Lifecycle for DomainAvailability {
    fn initialize(&self) -> CapabilityResult<()> {
        info!(server = %self.server, "initializing domain availability capability");
        Ok(())
    }

    fn shutdown(&self) -> CapabilityResult<()> {
        info!("shutting down domain availability capability");
        Ok(())
    }
}

#[async_trait]
impl AsyncCapability for DomainAvailability {
    type Input = String;
    type Output = bool;

    async fn execute(&self, domain: String) -> CapabilityResult<bool> {
        let domain = domain.trim();
        if domain.is_empty() || domain.chars().any(char::is_whitespace) {
            return Err(CapabilityError::new(format!(
                "`{domain}` is not a domain name"
            )));
        }
        let reply = self.whois(domain).await?;
        Ok(is_available(&reply))
    }
}

/// Returns `true` when the registry reply reports no existing record.
pub fn is_available(reply: &str) -> bool {
    reply.trim_start().starts_with(NO_MATCH)
}

pub fn capability() -> umcp_primitives::Result<Capability<String, bool>> {
    Capability::asynchronous(DomainAvailability::default())
        .name("domain-availability")?
        .description(
            "Checks if a domain name is available for registration based on a domain registry query.",
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;
    use umcp_capability::Executor;

    #[test]
    fn recognises_unregistered_domains() {
        assert!(is_available(
            "No match for \"SURELY-FREE-1234.COM\".\r\n>>> Last update of whois database"
        ));
        assert!(!is_available(
            "   Domain Name: EXAMPLE.COM\r\n   Registry Domain ID: 2336799_DOMAIN_COM-VRSN"
        ));
    }

    async fn fake_registry(reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut query = String::new();
            tokio::io::BufReader::new(reader)
                .read_line(&mut query)
                .await
                .unwrap();
            assert_eq!(query, "=free.example\r\n");
            writer.write_all(reply.as_bytes()).await.unwrap();
        });
        address
    }

    #[tokio::test]
    async fn queries_the_registry() {
        let server = fake_registry("No match for \"FREE.EXAMPLE\".\r\n").await;
        let capability = Capability::asynchronous(DomainAvailability::new(server))
            .name("domain-availability")
            .unwrap()
            .build()
            .unwrap();

        let available = capability
            .execute_async(" free.example ".into(), &Executor::current().unwrap())
            .await
            .unwrap();
        assert!(available);
    }

    #[tokio::test]
    async fn rejects_blank_domains() {
        let err = DomainAvailability::default()
            .execute("  ".into())
            .await
            .unwrap_err();
        assert!(err.message().contains("not a domain name"));
    }
}
