//! uMCP bridge: serves the bundled capabilities as JSON-RPC tools over TCP or
//! stdio.

mod capabilities;
mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use umcp_server::{Dispatcher, McpServer, ToolRouter, serve_lines};

use crate::config::{Cli, TransportKind};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_file())?;

    let router = Arc::new(ToolRouter::new());
    let mut server = McpServer::builder()
        .name(cli.name())
        .version(cli.server_version())
        .transport(router.clone())
        .tools(capabilities::all()?)
        .build()
        .context("failed to build server")?;

    let report = server.start().await.context("failed to start server")?;
    for tool in report.tools() {
        if !tool.outcome().is_active() {
            warn!(tool = %tool.name(), outcome = ?tool.outcome(), "tool is not fully active");
        }
    }

    let dispatcher = Dispatcher::new(router);
    let served = match cli.transport() {
        TransportKind::Tcp => serve_tcp(&cli, dispatcher).await,
        TransportKind::Stdio => serve_stdio(dispatcher).await,
    };

    info!("shutting down bridge");
    server.close().await;
    served
}

async fn serve_tcp(cli: &Cli, dispatcher: Dispatcher) -> Result<()> {
    let address = format!("{}:{}", cli.host(), cli.port());
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "listening for JSON-RPC connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(connection) => connection,
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        continue;
                    }
                };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let session = peer.to_string();
                    info!(%session, "client connected");
                    let (reader, writer) = socket.into_split();
                    if let Err(err) =
                        serve_lines(&dispatcher, BufReader::new(reader), writer, Some(&session)).await
                    {
                        warn!(%session, error = %err, "connection ended with an error");
                    }
                    info!(%session, "client disconnected");
                });
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    error!(error = %err, "failed to listen for shutdown signal");
                }
                return Ok(());
            }
        }
    }
}

async fn serve_stdio(dispatcher: Dispatcher) -> Result<()> {
    info!("serving JSON-RPC over stdio");
    let session = "stdio";
    tokio::select! {
        served = serve_lines(
            &dispatcher,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            Some(session),
        ) => served.context("stdio transport failed"),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!(error = %err, "failed to listen for shutdown signal");
            }
            Ok(())
        }
    }
}
