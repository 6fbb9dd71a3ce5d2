//! Command-line configuration for the bridge.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::warn;

/// Port used when none, or an unparseable one, is given.
pub const DEFAULT_PORT: u16 = 3000;

/// How requests reach the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC over TCP connections.
    Tcp,
    /// Newline-delimited JSON-RPC over stdin and stdout.
    Stdio,
}

#[derive(Debug, Parser)]
#[command(name = "umcp-bridge", version, about = "Serves uMCP capabilities as tools")]
pub struct Cli {
    /// TCP port to listen on.
    #[arg(value_name = "PORT")]
    port: Option<String>,

    /// Address to bind in TCP mode.
    #[arg(long, env = "UMCP_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Request transport.
    #[arg(long, value_enum, default_value_t = TransportKind::Tcp)]
    transport: TransportKind,

    /// Log destination. Defaults to `logs/umcp.log`, or `logs/umcp-stdio.log` in stdio mode.
    #[arg(long, env = "UMCP_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Advertised server name.
    #[arg(long, default_value = "uMCP")]
    name: String,

    /// Advertised server version.
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    server_version: String,
}

impl Cli {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| match self.transport {
            TransportKind::Tcp => PathBuf::from("logs/umcp.log"),
            TransportKind::Stdio => PathBuf::from("logs/umcp-stdio.log"),
        })
    }

    /// Resolves the listening port, warning when the argument is unusable.
    pub fn port(&self) -> u16 {
        let Some(raw) = self.port.as_deref() else {
            return DEFAULT_PORT;
        };
        parse_port(raw).unwrap_or_else(|| {
            warn!(port = raw, default = DEFAULT_PORT, "invalid port number, using default");
            DEFAULT_PORT
        })
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse().ok()
}
