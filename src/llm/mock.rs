//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 回显最后一条 User 消息，包在一个 ```html 代码块里，并记录收到的 API Key。
//! 预设的错误文本按真实服务的错误消息分类（凭据类为 Auth）。

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::llm_failure;
use crate::core::FlowError;
use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：回显用户最后一条消息；设置 reply 后改为固定回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    reply: Option<Result<String, String>>,
    seen_keys: Mutex<Vec<String>>,
    seen_messages: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: Result<String, String>) -> Self {
        Self {
            reply: Some(reply),
            ..Self::default()
        }
    }

    /// 每次调用收到的 API Key
    pub fn seen_keys(&self) -> Vec<String> {
        self.seen_keys.lock().map(|k| k.clone()).unwrap_or_default()
    }

    /// 每次调用收到的消息
    pub fn seen_messages(&self) -> Vec<Vec<Message>> {
        self.seen_messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message], api_key: &str) -> Result<String, FlowError> {
        if let Ok(mut keys) = self.seen_keys.lock() {
            keys.push(api_key.to_string());
        }
        if let Ok(mut seen) = self.seen_messages.lock() {
            seen.push(messages.to_vec());
        }
        if let Some(reply) = &self.reply {
            return reply.clone().map_err(llm_failure);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("```html\n<p>Echo from Mock: {last_user}</p>\n```"))
    }
}
