//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! API Key 每次调用传入，因此 Client 按调用构建（构建本身不发请求）。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::error::{llm_failure, looks_like_auth_failure};
use crate::core::FlowError;
use crate::llm::{LlmClient, Message, Role};

/// OpenAI 兼容客户端：持有 base_url 与 model 名，complete 时转 Message 为 API 格式并取首条 content
pub struct OpenAiClient {
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn client(&self, api_key: &str) -> Client<OpenAIConfig> {
        let config = OpenAIConfig::new()
            .with_api_base(&self.base_url)
            .with_api_key(api_key);
        Client::with_config(config)
    }

    fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, FlowError> {
        messages
            .iter()
            .map(|m| -> Result<ChatCompletionRequestMessage, FlowError> {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(classify)?,
                    ),
                    Role::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(classify)?,
                    ),
                    Role::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(classify)?,
                    ),
                };
                Ok(msg)
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message], api_key: &str) -> Result<String, FlowError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_openai_messages(messages)?)
            .build()
            .map_err(classify)?;

        let response = self
            .client(api_key)
            .chat()
            .create(request)
            .await
            .map_err(classify)?;

        if let Some(usage) = &response.usage {
            tracing::info!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "llm usage"
            );
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }
}

/// 保留 async_openai 的错误种类：传输层失败为 Connection，服务端拒绝凭据为 Auth
fn classify(e: OpenAIError) -> FlowError {
    match e {
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => FlowError::Auth(e.to_string()),
            _ => FlowError::Connection(e.to_string()),
        },
        OpenAIError::ApiError(api) => {
            let auth_code = [api.r#type.as_deref(), api.code.as_deref()]
                .into_iter()
                .flatten()
                .any(|c| c.contains("auth") || c.contains("api_key"));
            if auth_code || looks_like_auth_failure(&api.message) {
                FlowError::Auth(api.to_string())
            } else {
                FlowError::Llm(api.to_string())
            }
        }
        other => llm_failure(other.to_string()),
    }
}
