//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient。凭据按请求传入，
//! 因为调用方可以在请求里覆盖进程默认的 API Key。

use async_trait::async_trait;

use crate::core::FlowError;
use crate::llm::Message;

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 模型名（写入流程日志）
    fn model(&self) -> &str;

    /// 非流式完成，返回首条 choice 的文本；网络失败为 Connection，凭据被拒为 Auth
    async fn complete(&self, messages: &[Message], api_key: &str) -> Result<String, FlowError>;
}
