//! MCP 传输层
//!
//! 只负责把信封发出去并带回原始响应（状态码、Content-Type、响应体）；
//! 响应分类（鉴权失败 / 工具错误 / 结构异常）由 ToolInvoker 完成，便于测试桩直接返回原始体。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

use crate::config::{AuthScheme, StitchSection};
use crate::core::FlowError;
use crate::tools::mcp::JsonRpcRequest;

/// Google API Key 头
pub const API_KEY_HEADER: &str = "X-Goog-Api-Key";

/// 传输层返回的原始响应
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl TransportReply {
    /// 200 + application/json，测试桩常用
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输 trait：发送一次请求并等待一次响应；网络失败返回 FlowError::Connection，不做重试
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&self, request: &JsonRpcRequest, credential: &str) -> Result<TransportReply, FlowError>;
}

/// 基于 reqwest 的 HTTP 传输
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    auth: AuthScheme,
}

impl HttpTransport {
    pub fn new(endpoint: &str, auth: AuthScheme, timeout_secs: u64) -> Result<Self, FlowError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FlowError::Connection(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_config(cfg: &StitchSection) -> Result<Self, FlowError> {
        Self::new(&cfg.endpoint, cfg.auth, cfg.timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, request: &JsonRpcRequest, credential: &str) -> Result<TransportReply, FlowError> {
        let builder = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request);

        let builder = match self.auth {
            AuthScheme::ApiKey => builder.header(API_KEY_HEADER, credential),
            AuthScheme::Bearer => builder.header(AUTHORIZATION, format!("Bearer {credential}")),
        };

        let resp = builder.send().await.map_err(|e| {
            FlowError::Connection(format!("Request to {} failed: {e}", self.endpoint))
        })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp
            .text()
            .await
            .map_err(|e| FlowError::Connection(format!("Read body: {e}")))?;

        Ok(TransportReply {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let t = HttpTransport::new("https://stitch.example.com/mcp/", AuthScheme::ApiKey, 5).unwrap();
        assert_eq!(t.endpoint(), "https://stitch.example.com/mcp");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        // 端口 9 (discard) 在测试环境通常无人监听
        let t = HttpTransport::new("http://127.0.0.1:9/mcp", AuthScheme::Bearer, 2).unwrap();
        let req = JsonRpcRequest::tool_call("1", "create_project", serde_json::json!({}));
        let err = t.send(&req, "key").await.unwrap_err();
        assert!(matches!(err, FlowError::Connection(_)));
    }
}
