//! Line-delimited JSON-RPC 2.0 front end for a [`ToolRouter`].
//!
//! Answers `initialize`, `ping`, `tools/list` and `tools/call`. The
//! `initialize` reply is fixed: no protocol negotiation takes place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use umcp_tools::{Arguments, Exchange, InvocationResult};

use crate::transport::{ToolRouter, TransportError};

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes used by the dispatcher.
pub mod codes {
    /// Malformed JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Not a JSON-RPC 2.0 request.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Bad or missing parameters, including unknown tool names.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Server-side failure.
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Deserialize)]
struct Request {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Arguments>,
}

/// One JSON-RPC response frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Returns the result payload of a successful response.
    #[must_use]
    pub fn result_value(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error of a failed response.
    #[must_use]
    pub fn rpc_error(&self) -> Option<&RpcError> {
        self.error.as_ref()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    /// Returns the numeric code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Maps JSON-RPC requests onto a router.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<ToolRouter>,
}

impl Dispatcher {
    /// Creates a dispatcher over `router`.
    #[must_use]
    pub fn new(router: Arc<ToolRouter>) -> Self {
        Self { router }
    }

    /// Handles one raw frame. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str, session: Option<&str>) -> Option<Response> {
        let frame: Value = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "unparseable JSON-RPC frame");
                return Some(Response::error(
                    Value::Null,
                    codes::PARSE_ERROR,
                    format!("Parse error: {err}"),
                ));
            }
        };
        let id = frame.get("id").cloned().unwrap_or(Value::Null);
        let request: Request = match serde_json::from_value(frame) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "malformed JSON-RPC request");
                return Some(Response::error(
                    id,
                    codes::INVALID_REQUEST,
                    format!("Invalid request: {err}"),
                ));
            }
        };
        self.handle(request, session).await
    }

    async fn handle(&self, request: Request, session: Option<&str>) -> Option<Response> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "notification received");
            return None;
        };

        if request.jsonrpc != "2.0" {
            return Some(Response::error(
                id,
                codes::INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => self.initialize(id),
            "ping" => Response::result(id, json!({})),
            "tools/list" => Response::result(id, json!({ "tools": self.router.list() })),
            "tools/call" => self.call(id, request.params, session).await,
            other => Response::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn initialize(&self, id: Value) -> Response {
        match (self.router.server_info(), self.router.server_capabilities()) {
            (Some(info), Some(capabilities)) => Response::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "serverInfo": info,
                    "capabilities": capabilities,
                }),
            ),
            _ => Response::error(id, codes::INTERNAL_ERROR, "Server is not open"),
        }
    }

    async fn call(&self, id: Value, params: Option<Value>, session: Option<&str>) -> Response {
        let params: CallParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(err)) => {
                return Response::error(id, codes::INVALID_PARAMS, format!("Invalid params: {err}"));
            }
            None => return Response::error(id, codes::INVALID_PARAMS, "Invalid params: missing"),
        };

        let mut exchange = Exchange::new();
        if let Some(session) = session {
            exchange = exchange.with_session(session);
        }

        match self
            .router
            .call(&params.name, exchange, params.arguments)
            .await
        {
            Ok(result) => Response::result(id, call_result(&result)),
            Err(TransportError::UnknownTool { name }) => Response::error(
                id,
                codes::INVALID_PARAMS,
                format!("Unknown tool: {name}"),
            ),
            Err(err) => Response::error(id, codes::INTERNAL_ERROR, err.to_string()),
        }
    }
}

fn call_result(result: &InvocationResult) -> Value {
    json!({
        "content": [{ "type": "text", "text": result.content() }],
        "isError": result.is_error(),
    })
}

/// Serves newline-delimited requests from `reader`, writing one response
/// line per request to `writer`, until `reader` is exhausted.
///
/// # Errors
///
/// Returns the first I/O error from either side.
pub async fn serve_lines<R, W>(
    dispatcher: &Dispatcher,
    reader: R,
    mut writer: W,
    session: Option<&str>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(response) = dispatcher.handle_line(&line, session).await else {
            continue;
        };
        let mut frame = serde_json::to_vec(&response)?;
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ToolTransport;
    use futures::FutureExt;
    use umcp_primitives::{ServerCapabilities, ServerInfo, ToolName};
    use umcp_tools::{InvocationHandler, JsonSchema, ToolDescriptor};

    async fn dispatcher() -> Dispatcher {
        let router = Arc::new(ToolRouter::new());
        router
            .open(
                &ServerInfo::new("umcp", "0.3.0").unwrap(),
                &ServerCapabilities::bridge_defaults(),
            )
            .await
            .unwrap();
        let handler: InvocationHandler = Arc::new(|_exchange: Exchange, arguments: Option<Arguments>| {
            async move {
                match arguments.and_then(|mut args| args.remove("text")) {
                    Some(Value::String(text)) => InvocationResult::success(text),
                    _ => InvocationResult::failure("text missing"),
                }
            }
            .boxed()
        });
        router
            .announce_tool(
                ToolDescriptor::new(
                    ToolName::new("say").unwrap(),
                    "Repeats text",
                    JsonSchema::permissive(),
                ),
                handler,
            )
            .await
            .unwrap();
        Dispatcher::new(router)
    }

    fn to_json(response: Option<Response>) -> Value {
        serde_json::to_value(response.expect("response")).unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_fixed_manifest() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None)
            .await;
        let value = to_json(response);

        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["result"]["serverInfo"]["name"], "umcp");
        assert_eq!(value["result"]["capabilities"]["tools"]["listChanged"], true);
    }

    #[tokio::test]
    async fn lists_and_calls_tools() {
        let dispatcher = dispatcher().await;

        let list = to_json(
            dispatcher
                .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, None)
                .await,
        );
        assert_eq!(list["result"]["tools"][0]["name"], "say");
        assert_eq!(list["result"]["tools"][0]["inputSchema"]["type"], "object");

        let call = to_json(
            dispatcher
                .handle_line(
                    r#"{"jsonrpc":"2.0","id":"c","method":"tools/call","params":{"name":"say","arguments":{"text":"hi"}}}"#,
                    Some("test"),
                )
                .await,
        );
        assert_eq!(
            call,
            json!({
                "jsonrpc": "2.0",
                "id": "c",
                "result": {"content": [{"type": "text", "text": "hi"}], "isError": false},
            })
        );
    }

    #[tokio::test]
    async fn reports_protocol_errors() {
        let dispatcher = dispatcher().await;

        let cases = [
            ("not json", codes::PARSE_ERROR),
            (r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#, codes::METHOD_NOT_FOUND),
            (r#"{"jsonrpc":"2.0","id":1,"method":"tools/call"}"#, codes::INVALID_PARAMS),
            (
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"nope"}}"#,
                codes::INVALID_PARAMS,
            ),
            (r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#, codes::INVALID_REQUEST),
            (r#"{"jsonrpc":"2.0","id":1}"#, codes::INVALID_REQUEST),
            (r#"{"id":1,"method":"ping"}"#, codes::INVALID_REQUEST),
            (r#"{"jsonrpc":"2.0","id":1,"method":7}"#, codes::INVALID_REQUEST),
            ("[1, 2]", codes::INVALID_REQUEST),
            (r#"{"jsonrpc":"2.0","id":1,"method":"ping""#, codes::PARSE_ERROR),
        ];

        for (line, code) in cases {
            let response = dispatcher.handle_line(line, None).await.expect("response");
            assert_eq!(response.rpc_error().map(RpcError::code), Some(code), "{line}");
        }
    }

    #[tokio::test]
    async fn malformed_request_keeps_its_id() {
        let dispatcher = dispatcher().await;

        let value = to_json(
            dispatcher
                .handle_line(r#"{"jsonrpc":"2.0","id":"abc","params":{}}"#, None)
                .await,
        );
        assert_eq!(value["id"], "abc");
        assert_eq!(value["error"]["code"], codes::INVALID_REQUEST);

        let value = to_json(dispatcher.handle_line("{]", None).await);
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, None)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn serves_line_delimited_frames() {
        let dispatcher = dispatcher().await;
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );
        let mut output = Vec::new();

        serve_lines(&dispatcher, input.as_bytes(), &mut output, None)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["result"], json!({}));
    }
}
