//! Contains the core data structures for the Model Context Protocol (MCP) wire format.
//!
//! Every message on the wire is a JSON-RPC 2.0 document. Requests carry an
//! `id` and a `method`; responses carry the same `id` with either a `result`
//! or an `error`. The same envelope is used in both directions: the client
//! issues `tools/*` requests, and the server issues `sampling/createMessage`
//! requests back at the client. We use the `serde` library for robust and
//! efficient JSON handling.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Protocol Version ---
pub const LATEST_PROTOCOL_VERSION: &str = "2024-11-05";

// --- Method Names ---
pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_LIST_TOOLS: &str = "tools/list";
pub const METHOD_CALL_TOOL: &str = "tools/call";
pub const METHOD_CREATE_MESSAGE: &str = "sampling/createMessage";

// --- Core Public API Types ---

/// Definition for a tool the client can call, as advertised by `tools/list`.
///
/// `input_schema` is the JSON rendering of the server's
/// [`crate::schema::InputSchema`] descriptor; clients treat it as opaque
/// discovery data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl Default for Tool {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            input_schema: Value::Object(Default::default()),
        }
    }
}

// --- Result Types ---

/// The server's response to a `tools/call` request.
///
/// Tool-level failures (unknown tool, invalid arguments, handler errors) are
/// reported here with `is_error: true` rather than as JSON-RPC errors, so a
/// well-formed call always produces a response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful result carrying a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A failure result carrying a single text block describing the problem.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// The server's response to a `tools/list` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

// --- Content Types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl Content {
    /// Returns the inner text if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

// --- Sampling Types ---

/// One prompt message in a server-initiated sampling exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    pub role: String, // "user" or "assistant"
    pub content: Content,
}

impl SamplingMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Content::Text { text: text.into() },
        }
    }
}

/// Parameters of a `sampling/createMessage` request, flowing server→client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    pub messages: Vec<SamplingMessage>,
    pub max_tokens: u32,
}

/// The client's resolution of a sampling exchange, flowing client→server as
/// the response to the same request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    pub role: String,
    pub content: Content,
    /// Label for whatever produced the answer, e.g. "user-input" or a model name.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CreateMessageResult {
    pub const STOP_REASON_END_TURN: &'static str = "endTurn";

    /// A resolution carrying user-typed text, the common terminal case.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Content::Text { text: text.into() },
            model: "user-input".to_string(),
            stop_reason: Some(Self::STOP_REASON_END_TURN.to_string()),
        }
    }

    /// Returns the resolution's text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}

// --- Foundational JSON-RPC Types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request<T> {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    pub params: T,
}

impl Request<Value> {
    pub fn new<P: Serialize>(id: RequestId, method: &str, params: P) -> serde_json::Result<Self> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: T,
}

impl Response<Value> {
    pub fn new<R: Serialize>(id: RequestId, result: R) -> serde_json::Result<Self> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: serde_json::to_value(result)?,
        })
    }
}

/// The opaque correlation token carried by every request. Unique per open
/// request on a given connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification<T> {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub params: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JSONRPCResponse<T> {
    Success(Response<T>),
    Error(ErrorResponse),
}

// --- JSON-RPC Error Types ---
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub error: ErrorData,
}

impl ErrorResponse {
    pub fn new(id: RequestId, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            error: ErrorData {
                code,
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: i32,
    pub message: String,
}

// --- Initialization Handshake Types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestParams {
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Present when the client can answer `sampling/createMessage` requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingCapability {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

// --- Method-Specific Parameter Types ---

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_roundtrip() {
        let tool = Tool {
            name: "web_search".to_string(),
            description: Some("Searches the web".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }),
        };
        let json_string = serde_json::to_string(&tool).unwrap();
        let deserialized: Tool = serde_json::from_str(&json_string).unwrap();
        assert_eq!(tool, deserialized);

        // The discovery field must use the camelCase wire name.
        let value: Value = serde_json::from_str(&json_string).unwrap();
        assert!(value.get("inputSchema").is_some());
    }

    #[test]
    fn test_call_tool_result_wire_shape() {
        let result = CallToolResult::text("hi");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "hi");
        assert_eq!(value["isError"], false);

        let failure = CallToolResult::failure("unknown tool 'foo'");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["isError"], true);
    }

    #[test]
    fn test_create_message_result_wire_shape() {
        let result = CreateMessageResult::user_text("Y");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"]["type"], "text");
        assert_eq!(value["content"]["text"], "Y");
        assert_eq!(value["model"], "user-input");
        assert_eq!(value["stopReason"], "endTurn");
    }

    #[test]
    fn test_create_message_params_roundtrip() {
        let params = CreateMessageParams {
            messages: vec![SamplingMessage::user("confirm delete /tmp/x? (Y/N): ")],
            max_tokens: 100,
        };
        let json_string = serde_json::to_string(&params).unwrap();
        assert!(json_string.contains("maxTokens"));
        let deserialized: CreateMessageParams = serde_json::from_str(&json_string).unwrap();
        assert_eq!(params, deserialized);
    }

    #[test]
    fn test_call_tool_params_default_arguments() {
        // A call with no arguments field still parses; arguments default to null.
        let params: CallToolParams =
            serde_json::from_value(json!({ "name": "web_search" })).unwrap();
        assert_eq!(params.arguments, Value::Null);
    }

    #[test]
    fn test_jsonrpc_response_success() {
        let success_json = r#"
        {
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "status": "ok" }
        }
        "#;
        let response: JSONRPCResponse<Value> = serde_json::from_str(success_json).unwrap();
        match response {
            JSONRPCResponse::Success(s) => {
                assert_eq!(s.id, RequestId::Num(1));
                assert_eq!(s.result, json!({ "status": "ok" }));
            }
            JSONRPCResponse::Error(_) => panic!("Expected success response"),
        }
    }

    #[test]
    fn test_jsonrpc_response_error() {
        let error_json = r#"
        {
            "jsonrpc": "2.0",
            "id": 2,
            "error": {
                "code": -32601,
                "message": "Method not found"
            }
        }
        "#;
        let response: JSONRPCResponse<Value> = serde_json::from_str(error_json).unwrap();
        match response {
            JSONRPCResponse::Success(_) => panic!("Expected error response"),
            JSONRPCResponse::Error(e) => {
                assert_eq!(e.id, RequestId::Num(2));
                assert_eq!(e.error.code, -32601);
                assert_eq!(e.error.message, "Method not found");
            }
        }
    }

    #[test]
    fn test_string_request_ids_are_distinct() {
        let a: RequestId = serde_json::from_value(json!("req-1")).unwrap();
        let b: RequestId = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(a, RequestId::Str("req-1".to_string()));
        assert_ne!(a, b);
    }
}
