//! 工具调用器
//!
//! 持有 McpTransport，invoke(tool_name, args, credential) 组装 JSON-RPC 信封并发送一次，
//! 将原始响应分类为 FlowError（Auth / Tool / UpstreamMalformed）；每次调用输出结构化审计日志（JSON）。
//! 单次尝试，不重试、不退避。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::error::looks_like_auth_failure;
use crate::core::FlowError;
use crate::tools::mcp::{is_event_stream, sse_payload, JsonRpcRequest, JsonRpcResponse};
use crate::tools::transport::{McpTransport, TransportReply};

/// 工具调用器：每次调用一个远程工具，返回拼接后的文本结果
#[derive(Clone)]
pub struct ToolInvoker {
    transport: Arc<dyn McpTransport>,
}

impl ToolInvoker {
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self { transport }
    }

    /// 调用远程工具；credential 缺失应在上游拒绝，这里仅做防御性校验
    pub async fn invoke(&self, tool_name: &str, args: Value, credential: &str) -> Result<String, FlowError> {
        if tool_name.trim().is_empty() {
            return Err(FlowError::InvalidInput("tool name is empty".to_string()));
        }
        if credential.trim().is_empty() {
            return Err(FlowError::CredentialMissing("Stitch".to_string()));
        }

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let request = JsonRpcRequest::tool_call(uuid::Uuid::new_v4().to_string(), tool_name, args);

        let result = match self.transport.send(&request, credential).await {
            Ok(reply) => classify(tool_name, reply),
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "id": request.id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }
}

/// 把原始响应映射为文本结果或分类后的错误
fn classify(tool: &str, reply: TransportReply) -> Result<String, FlowError> {
    if matches!(reply.status, 401 | 403) {
        let message = rpc_error_message(&reply.body).unwrap_or_else(|| preview(&reply.body));
        return Err(FlowError::Auth(format!("HTTP {}: {}", reply.status, message)));
    }

    if !reply.is_success() {
        let message = rpc_error_message(&reply.body).unwrap_or_else(|| preview(&reply.body));
        if looks_like_auth_failure(&message) {
            return Err(FlowError::Auth(message));
        }
        return Err(FlowError::tool(tool, format!("HTTP {}: {}", reply.status, message)));
    }

    let payload = if is_event_stream(reply.content_type.as_deref(), &reply.body) {
        sse_payload(&reply.body)
            .ok_or_else(|| FlowError::UpstreamMalformed("event stream without JSON data".to_string()))?
    } else {
        reply.body.as_str()
    };

    let response: JsonRpcResponse = serde_json::from_str(payload).map_err(|e| {
        FlowError::UpstreamMalformed(format!("{e}: {}", preview(payload)))
    })?;

    if let Some(err) = response.error {
        if looks_like_auth_failure(&err.message) {
            return Err(FlowError::Auth(err.message));
        }
        let message = match err.code {
            Some(code) => format!("[{code}] {}", err.message),
            None => err.message,
        };
        return Err(FlowError::tool(tool, message));
    }

    let result = response
        .result
        .ok_or_else(|| FlowError::UpstreamMalformed("response has neither result nor error".to_string()))?;
    let text = result.text();

    if result.is_error {
        if looks_like_auth_failure(&text) {
            return Err(FlowError::Auth(text));
        }
        return Err(FlowError::tool(tool, text));
    }

    Ok(text)
}

/// 尽量从错误响应体中取出 `error.message`
fn rpc_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(String::from)
}

fn preview(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

fn args_preview(args: &Value) -> String {
    preview(&args.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedTransport {
        reply: Result<TransportReply, FlowError>,
        seen: Mutex<Vec<(JsonRpcRequest, String)>>,
    }

    impl FixedTransport {
        fn new(reply: Result<TransportReply, FlowError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl McpTransport for FixedTransport {
        async fn send(&self, request: &JsonRpcRequest, credential: &str) -> Result<TransportReply, FlowError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.clone(), credential.to_string()));
            self.reply.clone()
        }
    }

    fn reply(status: u16, body: &str) -> Result<TransportReply, FlowError> {
        Ok(TransportReply {
            status,
            content_type: Some("application/json".into()),
            body: body.into(),
        })
    }

    #[tokio::test]
    async fn test_invoke_returns_text_and_sends_envelope() {
        let transport = FixedTransport::new(reply(
            200,
            r#"{"jsonrpc":"2.0","id":"x","result":{"content":[{"type":"text","text":"projects/42"}]}}"#,
        ));
        let invoker = ToolInvoker::new(transport.clone());
        let out = invoker
            .invoke("create_project", serde_json::json!({"title": "t"}), "key-1")
            .await
            .unwrap();
        assert_eq!(out, "projects/42");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.method, "tools/call");
        assert_eq!(seen[0].0.params.name, "create_project");
        assert!(!seen[0].0.id.is_empty());
        assert_eq!(seen[0].1, "key-1");
    }

    #[tokio::test]
    async fn test_sse_body_is_decoded() {
        let transport = FixedTransport::new(Ok(TransportReply {
            status: 200,
            content_type: Some("text/event-stream".into()),
            body: "event: message\ndata: {\"result\":{\"content\":[{\"text\":\"screens/9\"}]}}\n\n".into(),
        }));
        let out = ToolInvoker::new(transport)
            .invoke("get_screen", serde_json::json!({}), "k")
            .await
            .unwrap();
        assert_eq!(out, "screens/9");
    }

    #[tokio::test]
    async fn test_http_401_is_auth_error() {
        let transport = FixedTransport::new(reply(401, r#"{"error":{"message":"bad key"}}"#));
        let err = ToolInvoker::new(transport)
            .invoke("create_project", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Auth("HTTP 401: bad key".into()));
    }

    #[tokio::test]
    async fn test_rpc_error_is_tool_error_unless_auth() {
        let transport = FixedTransport::new(reply(
            200,
            r#"{"jsonrpc":"2.0","id":"1","error":{"code":-32602,"message":"unknown project"}}"#,
        ));
        let err = ToolInvoker::new(transport)
            .invoke("generate_screen_from_text", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::tool("generate_screen_from_text", "[-32602] unknown project")
        );

        let transport = FixedTransport::new(reply(
            200,
            r#"{"error":{"message":"API key not valid. Please pass a valid API key."}}"#,
        ));
        let err = ToolInvoker::new(transport)
            .invoke("create_project", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Auth(_)));
    }

    #[tokio::test]
    async fn test_is_error_result_is_tool_error() {
        let transport = FixedTransport::new(reply(
            200,
            r#"{"result":{"isError":true,"content":[{"type":"text","text":"quota exceeded"}]}}"#,
        ));
        let err = ToolInvoker::new(transport)
            .invoke("generate_screen_from_text", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::tool("generate_screen_from_text", "quota exceeded"));
    }

    #[tokio::test]
    async fn test_non_json_and_non_2xx() {
        let err = ToolInvoker::new(FixedTransport::new(reply(200, "<html>gateway</html>")))
            .invoke("get_screen", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UpstreamMalformed(_)));

        let err = ToolInvoker::new(FixedTransport::new(reply(500, "internal")))
            .invoke("get_screen", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::tool("get_screen", "HTTP 500: internal"));

        let err = ToolInvoker::new(FixedTransport::new(reply(200, r#"{"jsonrpc":"2.0"}"#)))
            .invoke("get_screen", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UpstreamMalformed(_)));
    }

    #[tokio::test]
    async fn test_connection_error_passes_through_without_retry() {
        let transport = FixedTransport::new(Err(FlowError::Connection("refused".into())));
        let err = ToolInvoker::new(transport.clone())
            .invoke("create_project", serde_json::json!({}), "k")
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Connection("refused".into()));
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_empty_inputs_before_sending() {
        let transport = FixedTransport::new(reply(200, "{}"));
        let invoker = ToolInvoker::new(transport.clone());
        assert!(matches!(
            invoker.invoke("", serde_json::json!({}), "k").await,
            Err(FlowError::InvalidInput(_))
        ));
        assert!(matches!(
            invoker.invoke("get_screen", serde_json::json!({}), " ").await,
            Err(FlowError::CredentialMissing(_))
        ));
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
