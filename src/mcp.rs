// Firebase MCP Gateway - MCP Server (JSON-RPC 2.0 over stdio)
//
// One JSON-RPC message per line. Protocol traffic is the only thing that
// ever touches stdout; logging goes to stderr. Every tools/call routes
// through the dispatcher, so the gate pipeline applies uniformly.

use crate::policy::RequestContext;
use crate::registry::Dispatcher;
use crate::response::ToolResponse;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "firebase-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Send a JSON-RPC result.
fn send_response(id: &Value, result: Value) {
    let response = json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    });
    write_line(&response);
}

/// Send a JSON-RPC error.
fn send_error(id: &Value, code: i64, message: &str) {
    let response = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    });
    write_line(&response);
}

fn write_line(response: &Value) {
    let msg = match serde_json::to_string(response) {
        Ok(m) => m,
        Err(e) => {
            log::error!("response serialization failed: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(msg.as_bytes());
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

/// One-line argument summary for the call log. Never the full payload.
fn param_summary(name: &str, args: &Value) -> String {
    match name {
        n if n.starts_with("firestore_") => {
            let collection = args
                .get("collection")
                .or_else(|| args.get("collection_id"))
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            match args.get("id").and_then(|v| v.as_str()) {
                Some(id) => format!("collection={} id={}", collection, id),
                None => {
                    let ops = args
                        .get("operations")
                        .and_then(|v| v.as_array())
                        .map(|a| a.len());
                    match ops {
                        Some(n) => format!("operations={}", n),
                        None => format!("collection={}", collection),
                    }
                }
            }
        }
        n if n.starts_with("auth_") => {
            let who = args
                .get("uid")
                .or_else(|| args.get("email"))
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            format!("user={}", who)
        }
        n if n.starts_with("storage_") => {
            let path = args
                .get("path")
                .or_else(|| args.get("prefix"))
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            let size = args
                .get("content")
                .and_then(|v| v.as_str())
                .map(|s| s.len());
            match size {
                Some(len) => format!("path={} content_len={}", path, len),
                None => format!("path={}", path),
            }
        }
        _ => {
            // Truncate on characters, not bytes: arguments can be non-ASCII.
            let s = args.to_string();
            if s.chars().count() > 300 {
                let truncated: String = s.chars().take(300).collect();
                format!("{}…", truncated)
            } else {
                s
            }
        }
    }
}

/// Envelope to MCP tool-result shape.
fn to_rpc_result(response: &ToolResponse) -> Value {
    json!({
        "content": &response.content,
        "isError": response.is_error,
    })
}

/// Blocking stdio server loop. Returns when stdin closes.
pub fn run(dispatcher: &Dispatcher) {
    log::info!("Starting {} v{}", SERVER_NAME, SERVER_VERSION);
    log::info!(
        "Policy: read_only={} allowed_collections={:?} disable_auth={} disable_storage={}",
        dispatcher.policy().read_only,
        dispatcher.policy().allowed_collections,
        dispatcher.policy().disable_auth,
        dispatcher.policy().disable_storage,
    );
    log::info!(
        "Rate limit: {} requests per {} ms",
        dispatcher.limiter().config().max_requests,
        dispatcher.limiter().config().window_ms,
    );

    let ctx = RequestContext::local();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("stdin read error: {}", e);
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("JSON parse error: {}", e);
                continue;
            }
        };

        let method = msg["method"].as_str().unwrap_or("");
        let id = &msg["id"];
        let params = &msg["params"];

        log::debug!("Received: {}", method);

        match method {
            "initialize" => {
                send_response(
                    id,
                    json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": { "tools": {} },
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": SERVER_VERSION,
                        }
                    }),
                );
            }

            "notifications/initialized" => {
                // No response needed
            }

            "tools/list" => {
                send_response(id, json!({ "tools": dispatcher.registry().definitions() }));
            }

            "tools/call" => {
                let name = params["name"].as_str().unwrap_or("");
                let args = params.get("arguments").cloned().unwrap_or(json!({}));

                log::info!("CALL {} | {}", name, param_summary(name, &args));

                let result = dispatcher.dispatch(name, &args, &ctx);
                if result.is_error {
                    let snippet: String = result.text().chars().take(200).collect();
                    log::warn!("FAIL {} | {}", name, snippet);
                }

                send_response(id, to_rpc_result(&result));
            }

            "ping" => {
                send_response(id, json!({}));
            }

            _ => {
                if !id.is_null() {
                    send_error(id, -32601, &format!("Unknown method: {}", method));
                }
            }
        }
    }
    log::info!("stdin closed, shutting down");
}

// ============================================================================
// TESTS
// ============================================================================
