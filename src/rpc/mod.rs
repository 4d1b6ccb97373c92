//! Line-delimited JSON command protocol.
//!
//! Each request is one JSON object on one line; each response is written as
//! one line and echoes the request `id`.

mod handlers;

use crate::error::Error;
use crate::indexer::Indexer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::{debug, warn};

pub const PROTOCOL_VERSION: &str = "1.0.0";

const DEFAULT_QUERY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: Value,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    UpdateFile {
        file_path: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    RemoveFile {
        file_path: String,
    },
    QueryGraph {
        query_type: QueryType,
        #[serde(default)]
        query_params: Value,
        #[serde(default = "default_query_limit")]
        limit: usize,
    },
    GetStats {
        #[serde(default)]
        detailed: bool,
    },
    Ping,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::UpdateFile { .. } => "update_file",
            Command::RemoveFile { .. } => "remove_file",
            Command::QueryGraph { .. } => "query_graph",
            Command::GetStats { .. } => "get_stats",
            Command::Ping => "ping",
        }
    }
}

fn default_query_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    FindDefinition,
    FindReferences,
    FindCallers,
    FindCallees,
    FindImplementations,
    GetDocumentation,
    GetFileSymbols,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::FindDefinition => "find_definition",
            QueryType::FindReferences => "find_references",
            QueryType::FindCallers => "find_callers",
            QueryType::FindCallees => "find_callees",
            QueryType::FindImplementations => "find_implementations",
            QueryType::GetDocumentation => "get_documentation",
            QueryType::GetFileSymbols => "get_file_symbols",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: Value,
    pub status: Status,
    pub version: &'static str,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    UpdateFile {
        nodes_added: usize,
        edges_added: usize,
        parsing_time_ms: f64,
    },
    RemoveFile {
        nodes_removed: usize,
    },
    Stats {
        stats: crate::model::GraphStats,
    },
    Error {
        error_message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
    Empty {},
}

impl ResponseBody {
    pub fn error(message: impl Into<String>, code: &str) -> Self {
        ResponseBody::Error {
            error_message: message.into(),
            error_code: Some(code.to_string()),
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, ResponseBody::Error { .. })
    }
}

impl From<&Error> for ResponseBody {
    fn from(err: &Error) -> Self {
        ResponseBody::error(err.to_string(), err.code())
    }
}

impl Response {
    pub fn new(id: Value, body: ResponseBody) -> Self {
        let status = if body.is_error() {
            Status::Error
        } else {
            Status::Success
        };
        Self {
            id,
            status,
            version: PROTOCOL_VERSION,
            body,
        }
    }

    pub fn error(id: Value, message: impl Into<String>, code: &str) -> Self {
        Self::new(id, ResponseBody::error(message, code))
    }
}

/// Parses one request line. `kind` is accepted in place of `command`.
///
/// A line that is not a JSON object yields an error response with a null id;
/// a well-formed object with a bad command echoes its id.
pub fn parse_request(line: &str) -> std::result::Result<Request, Response> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        Response::error(Value::Null, format!("invalid request: {err}"), "invalid_request")
    })?;
    let Value::Object(mut map) = value else {
        return Err(Response::error(
            Value::Null,
            "invalid request: expected a JSON object",
            "invalid_request",
        ));
    };
    let id = map.remove("id").unwrap_or(Value::Null);
    if !map.contains_key("command") {
        if let Some(kind) = map.remove("kind") {
            map.insert("command".to_string(), kind);
        }
    }
    map.remove("version");
    match serde_json::from_value::<Command>(Value::Object(map)) {
        Ok(command) => Ok(Request { id, command }),
        Err(err) => Err(Response::error(
            id,
            format!("invalid request: {err}"),
            "invalid_request",
        )),
    }
}

/// Dispatches requests to the indexer. Holds no state of its own.
pub struct Router {
    indexer: Indexer,
    slow_request_ms: u64,
}

impl Router {
    pub fn new(indexer: Indexer) -> Self {
        Self {
            indexer,
            slow_request_ms: 100,
        }
    }

    pub fn with_slow_request_ms(mut self, slow_request_ms: u64) -> Self {
        self.slow_request_ms = slow_request_ms;
        self
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let name = request.command.name();
        let body = match request.command {
            Command::UpdateFile {
                file_path,
                content,
                language,
            } => handlers::handle_update_file(&self.indexer, &file_path, &content, language.as_deref()),
            Command::RemoveFile { file_path } => {
                handlers::handle_remove_file(&self.indexer, &file_path)
            }
            Command::QueryGraph {
                query_type,
                query_params,
                limit,
            } => handlers::handle_query_graph(query_type, &query_params, limit),
            Command::GetStats { detailed } => handlers::handle_get_stats(&self.indexer, detailed),
            Command::Ping => ResponseBody::Empty {},
        };

        let elapsed = start.elapsed();
        if elapsed.as_millis() > u128::from(self.slow_request_ms) {
            warn!(command = name, elapsed_ms = elapsed.as_millis() as u64, "slow request");
        } else {
            debug!(command = name, elapsed_us = elapsed.as_micros() as u64, "handled request");
        }
        Response::new(request.id, body)
    }

    pub fn handle_line(&self, line: &str) -> Response {
        match parse_request(line) {
            Ok(request) => self.handle(request),
            Err(response) => response,
        }
    }
}

/// Answers one request per input line until EOF. Blank lines are skipped and
/// malformed lines get an error response; neither ends the loop.
pub fn serve<R: BufRead, W: Write>(router: &Router, reader: R, mut writer: W) -> Result<()> {
    for line in reader.lines() {
        let line = match line {
            Ok(value) => value,
            Err(err) => {
                warn!("input error: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let response = router.handle_line(&line);
        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;
    }
    Ok(())
}

pub fn serve_stdio(router: &Router) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(router, stdin.lock(), stdout.lock())
}

/// Runs a single raw request and returns the serialized response.
pub fn call(router: &Router, raw: &str) -> Result<String> {
    let response = router.handle_line(raw.trim());
    serde_json::to_string(&response).with_context(|| "serialize response")
}
