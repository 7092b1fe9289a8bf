//! 状态定义：单次生成流程的请求、中间句柄、日志轨迹与终态结果
//!
//! 每个值只活在一次请求内：处理完毕即丢弃，不做任何持久化。

use std::fmt;

use serde::Serialize;

use crate::core::FlowError;

/// 一次生成请求（不可变）
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub credentials: Credentials,
    pub continuation: Option<ContinuationToken>,
}

/// 已解析出的凭据：请求覆盖值优先，否则取进程默认值
#[derive(Clone, Default)]
pub struct Credentials {
    pub stitch: Option<String>,
    pub deepseek: Option<String>,
}

// 避免凭据进入日志
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("stitch", &self.stitch.as_ref().map(|_| "***"))
            .field("deepseek", &self.deepseek.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn stitch(&self) -> Result<&str, FlowError> {
        self.stitch
            .as_deref()
            .ok_or_else(|| FlowError::CredentialMissing("Stitch".to_string()))
    }

    pub fn deepseek(&self) -> Result<&str, FlowError> {
        self.deepseek
            .as_deref()
            .ok_or_else(|| FlowError::CredentialMissing("DeepSeek".to_string()))
    }
}

/// 项目句柄：每次流程恰好一个（新建或复用配置中的默认项目）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    pub id: String,
}

/// 生成步骤产出的界面描述；响应里找不到 screen id 时 id 为 None
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    pub id: Option<String>,
    pub raw_detail: String,
}

/// 续接令牌：`wv1:<project>:<screen>:<version>`，对前端不透明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub project_id: String,
    pub screen_id: String,
    pub version: u32,
}

const TOKEN_PREFIX: &str = "wv1";

impl ContinuationToken {
    pub fn new(project_id: impl Into<String>, screen_id: impl Into<String>, version: u32) -> Self {
        Self {
            project_id: project_id.into(),
            screen_id: screen_id.into(),
            version,
        }
    }

    /// 令牌字段不能为空，也不能含分隔符或空白
    pub fn is_valid_field(field: &str) -> bool {
        !field.is_empty() && !field.contains(':') && !field.chars().any(char::is_whitespace)
    }

    /// 任一字段无法放进令牌时返回 None
    pub fn try_new(project_id: &str, screen_id: &str, version: u32) -> Option<Self> {
        (Self::is_valid_field(project_id) && Self::is_valid_field(screen_id))
            .then(|| Self::new(project_id, screen_id, version))
    }

    pub fn parse(raw: &str) -> Result<Self, FlowError> {
        let invalid = || FlowError::InvalidInput(format!("invalid interaction_id: {raw}"));
        let mut parts = raw.trim().split(':');
        if parts.next() != Some(TOKEN_PREFIX) {
            return Err(invalid());
        }
        let project_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let screen_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let version = parts
            .next()
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(project_id, screen_id, version))
    }

    /// 续接后的下一版本
    pub fn next(&self) -> Self {
        Self::new(&self.project_id, &self.screen_id, self.version.saturating_add(1))
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TOKEN_PREFIX}:{}:{}:{}",
            self.project_id, self.screen_id, self.version
        )
    }
}

/// 日志条目：(来源, 消息)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub source: String,
    pub message: String,
}

/// 流程日志：只追加，返回给前端展示
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowLog {
    entries: Vec<LogEntry>,
}

impl FlowLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(source, %message, "flow log");
        self.entries.push(LogEntry {
            source: source.to_string(),
            message,
        });
    }

    pub fn sources(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.source.as_str()).collect()
    }

    /// 渲染为 `[source] message` 行
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("[{}] {}", e.source, e.message))
            .collect()
    }
}

/// 编排状态机的状态；除续接捷径（Start → DetailRetrieved）外严格线性
#[derive(Debug, Clone)]
pub enum FlowState {
    Start,
    ProjectResolved(ProjectHandle),
    ArtifactGenerated {
        project: ProjectHandle,
        artifact: ArtifactDescriptor,
    },
    DetailRetrieved {
        project: ProjectHandle,
        screen_id: Option<String>,
        code: String,
        version: u32,
    },
    Done(FlowResult),
    Failed(FlowResult),
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Start => "start",
            FlowState::ProjectResolved(_) => "project_resolved",
            FlowState::ArtifactGenerated { .. } => "artifact_generated",
            FlowState::DetailRetrieved { .. } => "detail_retrieved",
            FlowState::Done(_) => "done",
            FlowState::Failed(_) => "failed",
        }
    }
}

/// 一次流程的终态结果；成功与失败路径都恰好产出一次
#[derive(Debug, Clone)]
pub struct FlowResult {
    pub success: bool,
    pub code: Option<String>,
    pub log: FlowLog,
    pub continuation: Option<ContinuationToken>,
    pub error: Option<String>,
}

impl FlowResult {
    pub fn succeeded(code: String, log: FlowLog, continuation: Option<ContinuationToken>) -> Self {
        Self {
            success: true,
            code: Some(code),
            log,
            continuation,
            error: None,
        }
    }

    pub fn failed(error: &FlowError, mut log: FlowLog) -> Self {
        let message = error.to_string();
        log.push("Error", message.clone());
        Self {
            success: false,
            code: None,
            log,
            continuation: None,
            error: Some(message),
        }
    }

    pub fn version(&self) -> Option<u32> {
        self.continuation.as_ref().map(|t| t.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display_and_parse() {
        let token = ContinuationToken::new("abc123", "xyz789", 2);
        let raw = token.to_string();
        assert_eq!(raw, "wv1:abc123:xyz789:2");
        assert_eq!(ContinuationToken::parse(&raw).unwrap(), token);
    }

    #[test]
    fn test_token_rejects_garbage() {
        for raw in ["", "abc", "wv1:p", "wv1:p:s", "wv1:p:s:x", "wv2:p:s:1", "wv1::s:1", "wv1:p:s:1:extra"] {
            assert!(
                matches!(ContinuationToken::parse(raw), Err(FlowError::InvalidInput(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_token_fields_must_survive_parse() {
        assert!(ContinuationToken::try_new("a:b", "s", 1).is_none());
        assert!(ContinuationToken::try_new("p", "s 1", 1).is_none());
        let token = ContinuationToken::try_new("p-1", "s_2", 3).unwrap();
        assert_eq!(ContinuationToken::parse(&token.to_string()).unwrap(), token);
    }

    #[test]
    fn test_token_next() {
        let t = ContinuationToken::new("p", "s", 1).next();
        assert_eq!(t.version, 2);
        assert_eq!(t.screen_id, "s");
    }

    #[test]
    fn test_failed_result_appends_error_entry() {
        let mut log = FlowLog::new();
        log.push("System", "start");
        let result = FlowResult::failed(&FlowError::Connection("refused".into()), log);
        assert!(!result.success);
        assert!(result.code.is_none());
        assert_eq!(result.log.sources(), vec!["System", "Error"]);
        assert_eq!(result.error.as_deref(), Some("Connection error: refused"));
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let c = Credentials {
            stitch: Some("secret-key".into()),
            deepseek: None,
        };
        let s = format!("{c:?}");
        assert!(!s.contains("secret-key"));
        assert!(matches!(c.deepseek(), Err(FlowError::CredentialMissing(_))));
    }
}
