//! Purpose: Provide a transport-agnostic MCP JSON-RPC core for prospector.
//! Key exports: `McpDispatcher`, `McpHandler`, `ProspectorMcpHandler`.
//! Role: Protocol adapter exposing the six table operations as MCP tools.
//! Invariants: JSON-RPC envelopes stay stable and method routing is deterministic.
//! Invariants: Unknown methods and malformed request shapes map to protocol errors.
//! Invariants: Operation failures are returned as `result.isError` with an
//! `{"error": ...}` payload, never as a process fault.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::dedupe::KeepPolicy;
use crate::core::error::{Error, ErrorKind};
use crate::core::export::ExportOptions;
use crate::core::filter::FilterOptions;
use crate::core::search::SearchOptions;
use crate::core::table::DEDUPE_COLUMN;
use crate::core::{
    append_profiles, csv_stats, deduplicate_csv, export_segment, filter_profiles, search_profiles,
};

const JSON_RPC_VERSION: &str = "2.0";
const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
const PARSE_ERROR_CODE: i32 = -32700;
const INVALID_REQUEST_CODE: i32 = -32600;
const METHOD_NOT_FOUND_CODE: i32 = -32601;
const INVALID_PARAMS_CODE: i32 = -32602;
const INTERNAL_ERROR_CODE: i32 = -32603;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Number(i64),
    Null,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: JsonRpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR_CODE, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST_CODE, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(METHOD_NOT_FOUND_CODE, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS_CODE, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR_CODE, message)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    Response(JsonRpcResponse),
    NoResponse,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerMetadata {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl Default for ServerMetadata {
    fn default() -> Self {
        Self {
            name: "prospector".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<Value>,
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn success_json(value: &Value) -> Self {
        Self {
            content: vec![json!({
                "type": "text",
                "text": pretty_text(value),
            })],
            is_error: false,
        }
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        Self {
            content: vec![json!({
                "type": "text",
                "text": pretty_text(&json!({ "error": message.into() })),
            })],
            is_error: true,
        }
    }
}

fn pretty_text(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub trait McpHandler {
    fn list_tools(&mut self) -> Result<Vec<McpTool>, JsonRpcError>;
    fn call_tool(&mut self, request: ToolCallRequest) -> Result<ToolCallResult, JsonRpcError>;
}

pub struct McpDispatcher<H> {
    metadata: ServerMetadata,
    handler: H,
}

impl<H: McpHandler> McpDispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            metadata: ServerMetadata::default(),
            handler,
        }
    }

    pub fn metadata(&self) -> &ServerMetadata {
        &self.metadata
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn dispatch_value(&mut self, value: Value) -> DispatchOutcome {
        match parse_jsonrpc_request(value) {
            Ok(request) => self.dispatch_request(request),
            Err(response) => DispatchOutcome::Response(response),
        }
    }

    pub fn dispatch_request(&mut self, request: JsonRpcRequest) -> DispatchOutcome {
        let id = request.id.clone();
        let route_result = self.route_method(request);
        match id {
            Some(response_id) => match route_result {
                Ok(result) => {
                    DispatchOutcome::Response(JsonRpcResponse::success(response_id, result))
                }
                Err(error) => DispatchOutcome::Response(JsonRpcResponse::error(response_id, error)),
            },
            None => DispatchOutcome::NoResponse,
        }
    }

    fn route_method(&mut self, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => {
                ensure_object_or_absent(request.params.as_ref())?;
                to_value(self.initialize_result())
            }
            "notifications/initialized" => {
                ensure_object_or_absent(request.params.as_ref())?;
                Ok(json!({}))
            }
            "ping" => {
                ensure_object_or_absent(request.params.as_ref())?;
                Ok(json!({}))
            }
            "tools/list" => {
                ensure_object_or_absent(request.params.as_ref())?;
                let tools = self.handler.list_tools()?;
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => {
                let params = require_object_params(
                    request.params.as_ref(),
                    "tools/call requires object params",
                )?;
                let tool_request = parse_tool_call_params(params)?;
                let result = self.handler.call_tool(tool_request)?;
                to_value(result)
            }
            _ => Err(JsonRpcError::method_not_found(format!(
                "method not found: {}",
                request.method
            ))),
        }
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: self.metadata.protocol_version.clone(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: self.metadata.name.clone(),
                version: self.metadata.version.clone(),
            },
        }
    }
}

pub fn parse_jsonrpc_line(line: &str) -> Result<Value, JsonRpcError> {
    serde_json::from_str::<Value>(line).map_err(|_| JsonRpcError::parse_error("invalid JSON"))
}

fn parse_jsonrpc_request(value: Value) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let mut object = match value {
        Value::Object(object) => object,
        _ => {
            return Err(JsonRpcResponse::error(
                JsonRpcId::Null,
                JsonRpcError::invalid_request("request must be a JSON object"),
            ));
        }
    };

    let mut id: Option<JsonRpcId> = None;
    if let Some(raw_id) = object.remove("id") {
        let parsed_id = parse_jsonrpc_id(raw_id)
            .map_err(|error| JsonRpcResponse::error(JsonRpcId::Null, error))?;
        id = Some(parsed_id);
    }
    let error_id = id.clone().unwrap_or(JsonRpcId::Null);

    let jsonrpc = object
        .remove("jsonrpc")
        .and_then(|value| value.as_str().map(ToString::to_string))
        .ok_or_else(|| {
            JsonRpcResponse::error(
                error_id.clone(),
                JsonRpcError::invalid_request("missing jsonrpc field"),
            )
        })?;
    if jsonrpc != JSON_RPC_VERSION {
        return Err(JsonRpcResponse::error(
            error_id,
            JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }

    let method = object
        .remove("method")
        .and_then(|value| value.as_str().map(ToString::to_string))
        .ok_or_else(|| {
            JsonRpcResponse::error(
                id.clone().unwrap_or(JsonRpcId::Null),
                JsonRpcError::invalid_request("missing method field"),
            )
        })?;

    let params = object.remove("params");
    Ok(JsonRpcRequest {
        jsonrpc,
        id,
        method,
        params,
    })
}

fn parse_jsonrpc_id(value: Value) -> Result<JsonRpcId, JsonRpcError> {
    match value {
        Value::String(value) => Ok(JsonRpcId::String(value)),
        Value::Number(value) => value
            .as_i64()
            .map(JsonRpcId::Number)
            .ok_or_else(|| JsonRpcError::invalid_request("id must be an integer number")),
        Value::Null => Ok(JsonRpcId::Null),
        _ => Err(JsonRpcError::invalid_request(
            "id must be a string, integer number, or null",
        )),
    }
}

fn require_object_params<'a>(
    params: Option<&'a Value>,
    message: &'static str,
) -> Result<&'a Map<String, Value>, JsonRpcError> {
    match params {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(JsonRpcError::invalid_params(message)),
    }
}

fn ensure_object_or_absent(params: Option<&Value>) -> Result<(), JsonRpcError> {
    match params {
        None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
        _ => Err(JsonRpcError::invalid_params(
            "params must be an object when provided",
        )),
    }
}

fn parse_tool_call_params(params: &Map<String, Value>) -> Result<ToolCallRequest, JsonRpcError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires string param `name`"))?
        .to_string();

    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments.clone(),
        Some(_) => {
            return Err(JsonRpcError::invalid_params(
                "tools/call `arguments` must be an object",
            ));
        }
    };

    Ok(ToolCallRequest { name, arguments })
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|_| JsonRpcError::internal_error("failed to encode result"))
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Handler exposing the six table operations. Stateless: every call names its
/// own file path, so there is nothing to hold between requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProspectorMcpHandler;

impl ProspectorMcpHandler {
    pub fn new() -> Self {
        Self
    }
}

impl McpHandler for ProspectorMcpHandler {
    fn list_tools(&mut self) -> Result<Vec<McpTool>, JsonRpcError> {
        Ok(tool_definitions())
    }

    fn call_tool(&mut self, request: ToolCallRequest) -> Result<ToolCallResult, JsonRpcError> {
        tracing::debug!(tool = %request.name, "tool call");
        match run_tool(&request.name, &request.arguments) {
            Ok(value) => Ok(ToolCallResult::success_json(&value)),
            Err(err) => {
                tracing::warn!(tool = %request.name, error = %err, "tool call failed");
                Ok(ToolCallResult::execution_error(tool_error_message(&err)))
            }
        }
    }
}

fn tool_error_message(err: &Error) -> String {
    match err.message() {
        Some(message) => message.to_string(),
        None => format!("{err}"),
    }
}

fn tool_definitions() -> Vec<McpTool> {
    vec![
        McpTool {
            name: "append_profiles_to_csv".to_string(),
            description: "Append new prospect profiles to a CSV with automatic deduplication"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "csv_path": {"type": "string", "description": "Path to the CSV file"},
                    "profiles": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "List of profile objects to append"
                    },
                    "dedupe_column": {
                        "type": "string",
                        "default": DEDUPE_COLUMN,
                        "description": "Column name to use for deduplication"
                    }
                },
                "required": ["csv_path", "profiles"]
            }),
        },
        McpTool {
            name: "filter_profiles".to_string(),
            description: "Query and filter profiles by multiple criteria".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "csv_path": {"type": "string"},
                    "min_score": {"type": "number"},
                    "max_score": {"type": "number"},
                    "locations": {"type": "array", "items": {"type": "string"}},
                    "companies": {"type": "array", "items": {"type": "string"}},
                    "current_role_only": {"type": "boolean"},
                    "found_after_date": {
                        "type": "string",
                        "description": "ISO date string (e.g. 2026-02-16)"
                    },
                    "limit": {"type": "integer"}
                },
                "required": ["csv_path"]
            }),
        },
        McpTool {
            name: "get_csv_stats".to_string(),
            description: "Get summary statistics about the CSV".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "csv_path": {"type": "string"}
                },
                "required": ["csv_path"]
            }),
        },
        McpTool {
            name: "export_segment".to_string(),
            description: "Export a filtered subset to a new CSV file".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "source_csv": {"type": "string"},
                    "output_csv": {"type": "string"},
                    "min_score": {"type": "number"},
                    "locations": {"type": "array", "items": {"type": "string"}},
                    "companies": {"type": "array", "items": {"type": "string"}},
                    "columns": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["source_csv", "output_csv"]
            }),
        },
        McpTool {
            name: "search_profiles".to_string(),
            description: "Full-text search across text fields like Headline, Company, Match Reason"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "csv_path": {"type": "string"},
                    "search_term": {"type": "string"},
                    "columns": {"type": "array", "items": {"type": "string"}},
                    "case_sensitive": {"type": "boolean", "default": false},
                    "limit": {"type": "integer"}
                },
                "required": ["csv_path", "search_term"]
            }),
        },
        McpTool {
            name: "deduplicate_csv".to_string(),
            description: "Remove all duplicates from a CSV (maintenance operation)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "csv_path": {"type": "string"},
                    "dedupe_column": {"type": "string", "default": DEDUPE_COLUMN},
                    "keep": {"type": "string", "enum": ["first", "last"], "default": "first"}
                },
                "required": ["csv_path"]
            }),
        },
    ]
}

fn run_tool(name: &str, args: &Map<String, Value>) -> Result<Value, Error> {
    match name {
        "append_profiles_to_csv" => {
            let csv_path = require_str_arg(args, "csv_path")?;
            let profiles = require_profiles_arg(args)?;
            let dedupe_column = optional_str_arg(args, "dedupe_column")?
                .unwrap_or_else(|| DEDUPE_COLUMN.to_string());
            let summary = append_profiles(Path::new(&csv_path), &profiles, &dedupe_column)?;
            encode(summary)
        }
        "filter_profiles" => {
            let csv_path = require_str_arg(args, "csv_path")?;
            let options = FilterOptions {
                min_score: optional_f64_arg(args, "min_score")?,
                max_score: optional_f64_arg(args, "max_score")?,
                locations: optional_str_list_arg(args, "locations")?.unwrap_or_default(),
                companies: optional_str_list_arg(args, "companies")?.unwrap_or_default(),
                current_role_only: optional_bool_arg(args, "current_role_only")?
                    .unwrap_or(false),
                found_after_date: optional_str_arg(args, "found_after_date")?,
                limit: optional_usize_arg(args, "limit")?,
            };
            let records = filter_profiles(Path::new(&csv_path), &options)?;
            Ok(records_to_value(records))
        }
        "get_csv_stats" => {
            let csv_path = require_str_arg(args, "csv_path")?;
            let stats = csv_stats(Path::new(&csv_path))?;
            encode(stats)
        }
        "export_segment" => {
            let source_csv = require_str_arg(args, "source_csv")?;
            let output_csv = require_str_arg(args, "output_csv")?;
            let options = ExportOptions {
                min_score: optional_f64_arg(args, "min_score")?,
                locations: optional_str_list_arg(args, "locations")?.unwrap_or_default(),
                companies: optional_str_list_arg(args, "companies")?.unwrap_or_default(),
                columns: optional_str_list_arg(args, "columns")?,
            };
            let summary =
                export_segment(Path::new(&source_csv), Path::new(&output_csv), &options)?;
            encode(summary)
        }
        "search_profiles" => {
            let csv_path = require_str_arg(args, "csv_path")?;
            let search_term = require_str_arg(args, "search_term")?;
            let options = SearchOptions {
                columns: optional_str_list_arg(args, "columns")?,
                case_sensitive: optional_bool_arg(args, "case_sensitive")?.unwrap_or(false),
                limit: optional_usize_arg(args, "limit")?,
            };
            let records = search_profiles(Path::new(&csv_path), &search_term, &options)?;
            Ok(records_to_value(records))
        }
        "deduplicate_csv" => {
            let csv_path = require_str_arg(args, "csv_path")?;
            let dedupe_column = optional_str_arg(args, "dedupe_column")?
                .unwrap_or_else(|| DEDUPE_COLUMN.to_string());
            let keep = match optional_str_arg(args, "keep")? {
                Some(raw) => KeepPolicy::parse(&raw)?,
                None => KeepPolicy::First,
            };
            let summary = deduplicate_csv(Path::new(&csv_path), &dedupe_column, keep)?;
            encode(summary)
        }
        other => Err(Error::new(ErrorKind::Usage).with_message(format!("unknown tool: {other}"))),
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode tool result")
            .with_source(err)
    })
}

fn records_to_value(records: Vec<Map<String, Value>>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

fn missing_arg(key: &str) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!("missing required argument: {key}"))
}

fn bad_arg(key: &str, expected: &str) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!("argument {key} must be {expected}"))
}

fn require_str_arg(args: &Map<String, Value>, key: &str) -> Result<String, Error> {
    match args.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Null) | None => Err(missing_arg(key)),
        Some(_) => Err(bad_arg(key, "a string")),
    }
}

fn optional_str_arg(args: &Map<String, Value>, key: &str) -> Result<Option<String>, Error> {
    match args.get(key) {
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(bad_arg(key, "a string")),
    }
}

fn optional_f64_arg(args: &Map<String, Value>, key: &str) -> Result<Option<f64>, Error> {
    match args.get(key) {
        Some(Value::Number(value)) => Ok(value.as_f64()),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(bad_arg(key, "a number")),
    }
}

fn optional_usize_arg(args: &Map<String, Value>, key: &str) -> Result<Option<usize>, Error> {
    match args.get(key) {
        Some(Value::Number(value)) => value
            .as_u64()
            .map(|value| Some(value as usize))
            .ok_or_else(|| bad_arg(key, "a non-negative integer")),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(bad_arg(key, "a non-negative integer")),
    }
}

fn optional_bool_arg(args: &Map<String, Value>, key: &str) -> Result<Option<bool>, Error> {
    match args.get(key) {
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(bad_arg(key, "a boolean")),
    }
}

fn optional_str_list_arg(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, Error> {
    match args.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| match value {
                Value::String(value) => Ok(value.clone()),
                _ => Err(bad_arg(key, "an array of strings")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(bad_arg(key, "an array of strings")),
    }
}

fn require_profiles_arg(args: &Map<String, Value>) -> Result<Vec<Map<String, Value>>, Error> {
    match args.get("profiles") {
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| match value {
                Value::Object(object) => Ok(object.clone()),
                _ => Err(bad_arg("profiles", "an array of objects")),
            })
            .collect(),
        Some(Value::Null) | None => Err(missing_arg("profiles")),
        Some(_) => Err(bad_arg("profiles", "an array of objects")),
    }
}
