//! DeepSeek API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 默认模型: deepseek-chat，可在 [deepseek] model 中覆盖

use crate::config::DeepSeekSection;
use crate::llm::OpenAiClient;

/// DeepSeek API 常量
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 按 [deepseek] 段创建客户端；API Key 不绑定在客户端上，由每次请求提供
pub fn create_deepseek_client(cfg: &DeepSeekSection) -> OpenAiClient {
    OpenAiClient::new(&cfg.base_url, &cfg.model)
}
