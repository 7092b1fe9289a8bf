//! 测试桩：按工具名返回预设响应，并记录每次外呼

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use weaver::tools::{JsonRpcRequest, McpTransport, TransportReply};
use weaver::FlowError;

/// 一次被记录的外呼
#[derive(Debug, Clone)]
pub struct Call {
    pub tool: String,
    pub arguments: serde_json::Value,
    pub credential: String,
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, Result<TransportReply, FlowError>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 工具返回一段文本（包在 MCP content 里）
    pub fn text(mut self, tool: &str, text: &str) -> Self {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "stub",
            "result": {"content": [{"type": "text", "text": text}]}
        });
        self.replies
            .insert(tool.to_string(), Ok(TransportReply::json(body.to_string())));
        self
    }

    pub fn reply(mut self, tool: &str, reply: Result<TransportReply, FlowError>) -> Self {
        self.replies.insert(tool.to_string(), reply);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.tool).collect()
    }
}

#[async_trait]
impl McpTransport for ScriptedTransport {
    async fn send(&self, request: &JsonRpcRequest, credential: &str) -> Result<TransportReply, FlowError> {
        self.calls.lock().unwrap().push(Call {
            tool: request.params.name.clone(),
            arguments: request.params.arguments.clone(),
            credential: credential.to_string(),
        });
        self.replies
            .get(&request.params.name)
            .cloned()
            .unwrap_or_else(|| Err(FlowError::Connection(format!("no stub for {}", request.params.name))))
    }
}

/// 断言 `expected` 按顺序出现在 `actual` 中（允许中间夹杂其他项）
pub fn assert_in_order(actual: &[&str], expected: &[&str]) {
    let mut it = actual.iter();
    for want in expected {
        assert!(
            it.any(|got| got == want),
            "expected {want:?} in order within {actual:?}"
        );
    }
}
