//! 生成流程错误类型
//!
//! 所有错误在编排层顶部统一捕获一次：追加一条 `Error` 日志，并转为 success=false 的 FlowResult。

use thiserror::Error;

/// 一次生成流程中可能出现的错误（凭据、网络、鉴权、工具、解析）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// 请求与进程配置均未提供凭据；在任何外呼之前拒绝
    #[error("Missing {0} credential")]
    CredentialMissing(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// 上游拒绝凭据（401/403 或错误消息指向 API key）
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 上游工具执行了但报告逻辑错误
    #[error("Tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// 响应中缺少期望的标识；仅在解析项目 id 时致命
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// 非 JSON 或结构不符合 JSON-RPC
    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FlowError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// 稳定的分类名，用于结构化日志
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::CredentialMissing(_) => "credential_missing",
            FlowError::Connection(_) => "connection",
            FlowError::Auth(_) => "auth",
            FlowError::Tool { .. } => "tool",
            FlowError::Extraction(_) => "extraction",
            FlowError::UpstreamMalformed(_) => "upstream_malformed",
            FlowError::Llm(_) => "llm",
            FlowError::InvalidInput(_) => "invalid_input",
        }
    }
}

/// 判断上游错误文本是否指向无效凭据
pub(crate) fn looks_like_auth_failure(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    [
        "api key",
        "api_key",
        "apikey",
        "unauthenticated",
        "unauthorized",
        "permission denied",
        "permission_denied",
        "invalid credential",
        "invalid authentication",
        "authentication fail",
    ]
    .iter()
    .any(|needle| m.contains(needle))
}

/// LLM 服务返回的错误文本：凭据类归为 Auth，其余为 Llm
pub(crate) fn llm_failure(message: impl Into<String>) -> FlowError {
    let message = message.into();
    if looks_like_auth_failure(&message) {
        FlowError::Auth(message)
    } else {
        FlowError::Llm(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_detection() {
        assert!(looks_like_auth_failure("API key not valid. Please pass a valid API key."));
        assert!(looks_like_auth_failure("Request had invalid authentication credentials"));
        assert!(looks_like_auth_failure("PERMISSION_DENIED"));
        assert!(!looks_like_auth_failure("Project not found"));
    }

    #[test]
    fn test_llm_failure_classification() {
        assert_eq!(
            llm_failure("Authentication Fails, Your api key: ****abcd is invalid").kind(),
            "auth"
        );
        assert_eq!(llm_failure("Unauthorized").kind(), "auth");
        assert_eq!(
            llm_failure("model overloaded"),
            FlowError::Llm("model overloaded".into())
        );
    }

    #[test]
    fn test_display() {
        let e = FlowError::tool("get_screen", "screen not found");
        assert_eq!(e.to_string(), "Tool get_screen failed: screen not found");
        assert_eq!(e.kind(), "tool");
    }
}
