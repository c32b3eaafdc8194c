//! Minimal tool provider speaking the warden's line protocol on stdio.
//!
//! Used as a process fixture by the integration tests and for wiring checks
//! without real threat-intel backends. Every tool requires a string `query`
//! and answers with a JSON hit list.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use serde_json::{Value, json};
use warden_core::rpc::{PROTOCOL_VERSION, RpcResponse, codes, methods};

#[derive(Parser, Debug)]
#[command(name = "stub-provider", about = "Fake tool provider for wiring tests")]
struct Args {
    /// Name reported in serverInfo
    #[arg(long, default_value = "stub")]
    name: String,

    /// Comma-separated tool names to advertise
    #[arg(long, value_delimiter = ',', default_value = "search_logs")]
    tools: Vec<String>,

    /// Write this line to stderr on startup
    #[arg(long)]
    stderr: Option<String>,

    /// Exit with status 1 before reading any request
    #[arg(long)]
    exit_immediately: bool,

    /// Answer every tools/call with an internal error
    #[arg(long)]
    error_on_call: bool,

    /// Read requests but never answer them
    #[arg(long)]
    silent: bool,

    /// Exit right after answering tools/list
    #[arg(long)]
    exit_after_list: bool,
}

fn tool_list(args: &Args) -> Value {
    let tools: Vec<Value> = args
        .tools
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "description": format!("Stub tool {name}"),
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "limit": {"type": "integer"}
                    },
                    "required": ["query"]
                }
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn call_tool(args: &Args, id: Option<Value>, params: &Value) -> RpcResponse {
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
    if !args.tools.iter().any(|t| t == name) {
        return RpcResponse::failure(id, codes::INVALID_PARAMS, format!("Unknown tool: {name}"));
    }
    if args.error_on_call {
        return RpcResponse::failure(id, codes::INTERNAL_ERROR, "backend unavailable");
    }

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let query = arguments.get("query").and_then(Value::as_str).unwrap_or_default();
    let payload = json!({
        "provider": args.name,
        "tool": name,
        "query": query,
        "total_hits": 1,
        "results": [{"message": format!("match for {query}")}]
    });
    RpcResponse::success(
        id,
        json!({ "content": [{ "type": "text", "text": payload.to_string() }] }),
    )
}

fn handle(args: &Args, request: &Value) -> RpcResponse {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    match method {
        methods::INITIALIZE => RpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": args.name, "version": env!("CARGO_PKG_VERSION")}
            }),
        ),
        methods::TOOLS_LIST => RpcResponse::success(id, tool_list(args)),
        methods::TOOLS_CALL => call_tool(args, id, &params),
        other => RpcResponse::failure(id, codes::METHOD_NOT_FOUND, format!("Method not found: {other}")),
    }
}

fn run(args: &Args) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() || args.silent {
            continue;
        }
        let (response, listed) = match serde_json::from_str::<Value>(&line) {
            Ok(request) => (
                handle(args, &request),
                request.get("method").and_then(Value::as_str) == Some(methods::TOOLS_LIST),
            ),
            Err(e) => (
                RpcResponse::failure(None, codes::PARSE_ERROR, format!("Parse error: {e}")),
                false,
            ),
        };
        let encoded = serde_json::to_string(&response).map_err(io::Error::other)?;
        writeln!(stdout, "{encoded}")?;
        stdout.flush()?;
        if listed && args.exit_after_list {
            break;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(message) = &args.stderr {
        eprintln!("{message}");
    }
    if args.exit_immediately {
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stub-provider: {e}");
            ExitCode::FAILURE
        }
    }
}
