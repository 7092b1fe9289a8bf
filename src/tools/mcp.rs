//! MCP JSON-RPC 2.0 信封
//!
//! 请求固定为 `tools/call`；响应为 `{result:{content:[{type,text}], isError?}}` 或 `{error:{code,message}}`。
//! 端点可能以 SSE 返回（`data: {...}` 行），取最后一条可解析的 JSON。

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const TOOLS_CALL: &str = "tools/call";

/// JSON-RPC 2.0 请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: ToolCallParams,
}

/// `tools/call` 参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Value,
}

impl JsonRpcRequest {
    pub fn tool_call(id: impl Into<String>, name: &str, arguments: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: TOOLS_CALL.to_string(),
            params: ToolCallParams {
                name: name.to_string(),
                arguments,
            },
        }
    }
}

/// JSON-RPC 2.0 响应（字段均可缺省，结构校验由调用方完成）
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    #[allow(dead_code)]
    pub id: Option<Value>,
    pub result: Option<ToolCallResult>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: Option<i64>,
    pub message: String,
}

/// `tools/call` 结果
#[derive(Debug, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
    #[serde(default, rename = "structuredContent")]
    pub structured_content: Option<Value>,
}

impl ToolCallResult {
    /// 拼接所有 text 段；无文本时回退到 structuredContent 的 JSON 文本
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect();
        if !parts.is_empty() {
            return parts.join("\n");
        }
        self.structured_content
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub kind: Option<String>,
    pub text: Option<String>,
}

/// 从 SSE 响应体中取最后一条能解析为 JSON 的 `data:` 负载
pub fn sse_payload(body: &str) -> Option<&str> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| serde_json::from_str::<Value>(data).is_ok())
        .last()
}

/// 响应体是否为 SSE 格式
pub fn is_event_stream(content_type: Option<&str>, body: &str) -> bool {
    if content_type.is_some_and(|ct| ct.contains("text/event-stream")) {
        return true;
    }
    let head = body.trim_start();
    head.starts_with("event:") || head.starts_with("data:")
}
