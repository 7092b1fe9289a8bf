//! 请求处理：校验提示、解析凭据与续接令牌，调用编排器
//!
//! 凭据优先级：请求里的覆盖值 > 进程配置的默认值；都没有时在任何外呼之前拒绝。
//! 进程默认值在构建时从 AppConfig 读入，之后只读。

use std::sync::Arc;

use crate::config::{AppConfig, Backend};
use crate::core::{
    ContinuationToken, Credentials, FlowError, FlowResult, FlowSettings, GenerationRequest,
    Orchestrator,
};
use crate::llm::{create_deepseek_client, LlmClient};
use crate::tools::{HttpTransport, McpTransport, ToolInvoker};

/// 请求携带的凭据覆盖值（空串视为未提供）
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub stitch: Option<String>,
    pub deepseek: Option<String>,
}

/// 生成服务：持有编排器与进程默认凭据，可被并发请求共享
pub struct GenerateService {
    orchestrator: Orchestrator,
    defaults: Credentials,
}

impl GenerateService {
    pub fn new(orchestrator: Orchestrator, defaults: Credentials) -> Self {
        Self {
            orchestrator,
            defaults,
        }
    }

    /// 按配置装配：HTTP 传输 + DeepSeek 客户端
    pub fn from_config(cfg: &AppConfig) -> Result<Self, FlowError> {
        let transport: Arc<dyn McpTransport> = Arc::new(HttpTransport::from_config(&cfg.stitch)?);
        let llm: Arc<dyn LlmClient> = Arc::new(create_deepseek_client(&cfg.deepseek));
        Self::with_components(cfg, transport, llm)
    }

    /// 用给定的传输层与 LLM 装配（测试中注入桩实现）
    pub fn with_components(
        cfg: &AppConfig,
        transport: Arc<dyn McpTransport>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, FlowError> {
        let orchestrator = Orchestrator::new(
            ToolInvoker::new(transport),
            llm,
            FlowSettings::from_config(cfg)?,
        );
        let defaults = Credentials {
            stitch: non_blank(cfg.stitch.api_key.clone()),
            deepseek: non_blank(cfg.deepseek.api_key.clone()),
        };
        Ok(Self::new(orchestrator, defaults))
    }

    pub fn backend(&self) -> Backend {
        self.orchestrator.settings().backend
    }

    /// 进程是否配置了各项默认值（只返回布尔，不暴露凭据）
    pub fn has_default_stitch_key(&self) -> bool {
        self.defaults.stitch.is_some()
    }

    pub fn has_default_deepseek_key(&self) -> bool {
        self.defaults.deepseek.is_some()
    }

    pub fn has_default_project(&self) -> bool {
        self.orchestrator.settings().default_project_id.is_some()
    }

    /// 合并覆盖值与默认值，并检查当前后端需要的凭据是否齐全
    pub fn resolve_credentials(&self, overrides: CredentialOverrides) -> Result<Credentials, FlowError> {
        let creds = Credentials {
            stitch: non_blank(overrides.stitch).or_else(|| self.defaults.stitch.clone()),
            deepseek: non_blank(overrides.deepseek).or_else(|| self.defaults.deepseek.clone()),
        };
        let backend = self.backend();
        if backend.needs_stitch() {
            creds.stitch()?;
        }
        if backend.needs_deepseek() {
            creds.deepseek()?;
        }
        Ok(creds)
    }

    /// 处理一次生成请求；输入校验失败返回 Err，流程本身的失败体现在 FlowResult 中
    pub async fn handle(
        &self,
        prompt: &str,
        overrides: CredentialOverrides,
        interaction_id: Option<&str>,
    ) -> Result<FlowResult, FlowError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(FlowError::InvalidInput("prompt is empty".to_string()));
        }

        let continuation = interaction_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ContinuationToken::parse)
            .transpose()?;

        let credentials = self.resolve_credentials(overrides)?;

        tracing::info!(
            prompt_chars = prompt.chars().count(),
            resumed = continuation.is_some(),
            "generate request"
        );

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            credentials,
            continuation,
        };
        Ok(self.orchestrator.run(&request).await)
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
