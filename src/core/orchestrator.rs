//! 生成编排器：线性状态机
//!
//! Start → ProjectResolved → ArtifactGenerated → DetailRetrieved → Done，任一步失败进入 Failed。
//! 唯一的分支是续接令牌：Start 直接跳到 DetailRetrieved（跳过建项目与生成）。
//! 每一步前后都写入 FlowLog；错误只在 run 顶部捕获一次，转成 success=false 的 FlowResult。
//! 已创建的项目在失败时保持原样，不做回滚。
//!
//! deepseek 后端不经过 Stitch，单次 LLM 调用后直接提取 HTML。

use std::sync::Arc;

use tracing::Instrument;

use crate::config::{AppConfig, Backend};
use crate::core::{
    ArtifactDescriptor, ContinuationToken, FlowError, FlowLog, FlowResult, FlowState,
    GenerationRequest, ProjectHandle,
};
use crate::extract::{extract_code_fragment, extract_identifier, find_markup, IdPattern, KnownIds};
use crate::llm::{LlmClient, Message};
use crate::tools::stitch::{
    create_project_args, generate_screen_args, get_screen_args, project_title, GenerationParams,
    StitchTool,
};
use crate::tools::ToolInvoker;

const SYSTEM: &str = "System";
const DEEPSEEK: &str = "DeepSeek";

/// 直接生成时的系统提示
const CODEGEN_SYSTEM_PROMPT: &str = "You are a senior front-end engineer. \
Reply with exactly one complete, self-contained HTML document (inline CSS and JS, no external build step) \
inside a ```html code block. The page is rendered in a sandboxed iframe without cookies or storage.";

/// hybrid 模式下把 Stitch 设计稿转为 HTML 的系统提示
const CONVERT_SYSTEM_PROMPT: &str = "You convert UI design descriptions into code. \
Given the user's request and the design tool's screen detail, reply with exactly one complete, \
self-contained HTML document inside a ```html code block. Follow the design's layout, colors and copy.";

/// 编排所需的只读设置（启动时由 AppConfig 构建）
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub backend: Backend,
    /// 设置后复用此项目，不调用 create_project
    pub default_project_id: Option<String>,
    pub params: GenerationParams,
}

impl FlowSettings {
    /// 配置的项目 id 会写进续接令牌，因此不能含令牌分隔符
    pub fn from_config(cfg: &AppConfig) -> Result<Self, FlowError> {
        let default_project_id = cfg
            .stitch
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from);
        if let Some(id) = &default_project_id {
            if !ContinuationToken::is_valid_field(id) {
                return Err(FlowError::InvalidInput(format!(
                    "stitch.project_id must not contain ':' or whitespace: {id}"
                )));
            }
        }
        Ok(Self {
            backend: cfg.generation.backend,
            default_project_id,
            params: GenerationParams {
                device_type: cfg.stitch.device_type.clone(),
                model_id: cfg.stitch.model_id.clone(),
            },
        })
    }
}

/// 生成编排器：无内部可变状态，可被并发请求共享
pub struct Orchestrator {
    invoker: ToolInvoker,
    llm: Arc<dyn LlmClient>,
    settings: FlowSettings,
}

impl Orchestrator {
    pub fn new(invoker: ToolInvoker, llm: Arc<dyn LlmClient>, settings: FlowSettings) -> Self {
        Self {
            invoker,
            llm,
            settings,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// 执行一次流程；成功与失败都恰好返回一个 FlowResult
    pub async fn run(&self, request: &GenerationRequest) -> FlowResult {
        let span = tracing::info_span!(
            "flow",
            flow_id = %uuid::Uuid::new_v4(),
            backend = self.settings.backend.as_str()
        );
        async move {
            let result = match self.settings.backend {
                Backend::Deepseek => self.run_direct(request).await,
                Backend::Stitch | Backend::Hybrid => self.run_stitch(request).await,
            };
            match &result.error {
                None => tracing::info!(log_entries = result.log.sources().len(), "flow done"),
                Some(error) => tracing::warn!(%error, "flow failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stitch(&self, request: &GenerationRequest) -> FlowResult {
        let mut log = FlowLog::new();
        log.push(
            SYSTEM,
            format!("Starting {} flow", self.settings.backend.as_str()),
        );

        let mut state = FlowState::Start;
        loop {
            state = match state {
                FlowState::Done(result) | FlowState::Failed(result) => return result,
                current => {
                    let from = current.name();
                    match self.step(current, request, &mut log).await {
                        Ok(next) => {
                            tracing::debug!(from, to = next.name(), "transition");
                            next
                        }
                        Err(e) => {
                            tracing::debug!(from, kind = e.kind(), "transition to failed");
                            FlowState::Failed(FlowResult::failed(&e, std::mem::take(&mut log)))
                        }
                    }
                }
            };
        }
    }

    /// 单步转移；终态原样返回
    async fn step(
        &self,
        state: FlowState,
        request: &GenerationRequest,
        log: &mut FlowLog,
    ) -> Result<FlowState, FlowError> {
        match state {
            FlowState::Start => match &request.continuation {
                Some(token) => {
                    log.push(
                        SYSTEM,
                        format!(
                            "Resuming screen {} of project {} (version {})",
                            token.screen_id, token.project_id, token.version
                        ),
                    );
                    let project = ProjectHandle {
                        id: token.project_id.clone(),
                    };
                    let code = self
                        .retrieve(&project, &token.screen_id, request, log)
                        .await?;
                    Ok(FlowState::DetailRetrieved {
                        project,
                        screen_id: Some(token.screen_id.clone()),
                        code,
                        version: token.next().version,
                    })
                }
                None => {
                    let project = self.resolve_project(request, log).await?;
                    Ok(FlowState::ProjectResolved(project))
                }
            },
            FlowState::ProjectResolved(project) => {
                let artifact = self.generate(&project, request, log).await?;
                Ok(FlowState::ArtifactGenerated { project, artifact })
            }
            FlowState::ArtifactGenerated { project, artifact } => {
                let code = match artifact.id.as_deref() {
                    Some(screen_id) => self.retrieve(&project, screen_id, request, log).await?,
                    None => {
                        log.push(
                            SYSTEM,
                            "No screen id in generation response, extracting from it directly",
                        );
                        self.render(&artifact.raw_detail, &project, None, request, log)
                            .await?
                    }
                };
                Ok(FlowState::DetailRetrieved {
                    project,
                    screen_id: artifact.id,
                    code,
                    version: 1,
                })
            }
            FlowState::DetailRetrieved {
                project,
                screen_id,
                code,
                version,
            } => {
                let continuation = screen_id.as_deref().and_then(|screen| {
                    let token = ContinuationToken::try_new(&project.id, screen, version);
                    if token.is_none() {
                        log.push(SYSTEM, "Screen id cannot be resumed, no interaction_id returned");
                    }
                    token
                });
                log.push(SYSTEM, format!("Done, {} chars of HTML", code.len()));
                Ok(FlowState::Done(FlowResult::succeeded(
                    code,
                    std::mem::take(log),
                    continuation,
                )))
            }
            terminal @ (FlowState::Done(_) | FlowState::Failed(_)) => Ok(terminal),
        }
    }

    /// 第 1 步：复用默认项目，或创建新项目并提取 id；提取失败则整个流程失败
    async fn resolve_project(
        &self,
        request: &GenerationRequest,
        log: &mut FlowLog,
    ) -> Result<ProjectHandle, FlowError> {
        if let Some(id) = &self.settings.default_project_id {
            log.push(SYSTEM, format!("Using configured project {id}"));
            return Ok(ProjectHandle { id: id.clone() });
        }

        let tool = StitchTool::CreateProject;
        let title = project_title(chrono::Local::now());
        log.push(tool.name(), format!("Creating project \"{title}\""));
        let text = self
            .invoker
            .invoke(tool.name(), create_project_args(&title), request.credentials.stitch()?)
            .await?;

        let id = extract_identifier(&text, IdPattern::Project).ok_or_else(|| {
            FlowError::Extraction(
                "project id resolution failed: create_project response has no project id".to_string(),
            )
        })?;
        log.push(tool.name(), format!("Project created: {id}"));
        Ok(ProjectHandle { id })
    }

    /// 第 2 步：按提示生成界面，尽力提取 screen id
    async fn generate(
        &self,
        project: &ProjectHandle,
        request: &GenerationRequest,
        log: &mut FlowLog,
    ) -> Result<ArtifactDescriptor, FlowError> {
        let tool = StitchTool::GenerateScreen;
        log.push(
            tool.name(),
            format!(
                "Generating {} screen with {} in project {}",
                self.settings.params.device_type, self.settings.params.model_id, project.id
            ),
        );
        let text = self
            .invoker
            .invoke(
                tool.name(),
                generate_screen_args(&project.id, &request.prompt, &self.settings.params),
                request.credentials.stitch()?,
            )
            .await?;

        let id = extract_identifier(&text, IdPattern::Screen);
        match &id {
            Some(screen) => log.push(tool.name(), format!("Screen generated: {screen}")),
            None => log.push(tool.name(), "Screen generated, but no screen id found"),
        }
        Ok(ArtifactDescriptor {
            id,
            raw_detail: text,
        })
    }

    /// 第 3 步：取界面详情；hybrid 模式再交给 LLM 转代码
    async fn retrieve(
        &self,
        project: &ProjectHandle,
        screen_id: &str,
        request: &GenerationRequest,
        log: &mut FlowLog,
    ) -> Result<String, FlowError> {
        let tool = StitchTool::GetScreen;
        log.push(tool.name(), format!("Fetching screen {screen_id}"));
        let detail = self
            .invoker
            .invoke(
                tool.name(),
                get_screen_args(&project.id, screen_id),
                request.credentials.stitch()?,
            )
            .await?;
        log.push(tool.name(), format!("Received {} chars of screen detail", detail.len()));
        self.render(&detail, project, Some(screen_id), request, log)
            .await
    }

    /// 把 Stitch 返回的文本变成可展示代码；hybrid 模式先经 LLM 转换
    async fn render(
        &self,
        detail: &str,
        project: &ProjectHandle,
        screen_id: Option<&str>,
        request: &GenerationRequest,
        log: &mut FlowLog,
    ) -> Result<String, FlowError> {
        if self.settings.backend != Backend::Hybrid {
            return Ok(self.code_from_text(detail, project, screen_id, log));
        }

        let api_key = request.credentials.deepseek()?;
        log.push(
            DEEPSEEK,
            format!("Converting screen to HTML with {}", self.llm.model()),
        );
        let messages = [
            Message::system(CONVERT_SYSTEM_PROMPT),
            Message::user(format!(
                "Request:\n{}\n\nScreen detail:\n{}",
                request.prompt, detail
            )),
        ];
        let reply = self.llm.complete(&messages, api_key).await?;
        log.push(DEEPSEEK, format!("Received {} chars", reply.len()));
        Ok(self.code_from_text(&reply, project, screen_id, log))
    }

    fn code_from_text(
        &self,
        text: &str,
        project: &ProjectHandle,
        screen_id: Option<&str>,
        log: &mut FlowLog,
    ) -> String {
        if find_markup(text).is_none() {
            log.push(SYSTEM, "No complete HTML document in response, building preview page");
        }
        extract_code_fragment(
            text,
            KnownIds {
                project_id: Some(&project.id),
                screen_id,
            },
        )
    }

    /// deepseek 后端：单次 LLM 调用
    async fn run_direct(&self, request: &GenerationRequest) -> FlowResult {
        let mut log = FlowLog::new();
        log.push(SYSTEM, "Starting deepseek flow");
        if request.continuation.is_some() {
            log.push(SYSTEM, "interaction_id is ignored by the deepseek backend");
        }

        match self.generate_direct(request, &mut log).await {
            Ok(code) => {
                log.push(SYSTEM, format!("Done, {} chars of HTML", code.len()));
                FlowResult::succeeded(code, log, None)
            }
            Err(e) => FlowResult::failed(&e, log),
        }
    }

    async fn generate_direct(
        &self,
        request: &GenerationRequest,
        log: &mut FlowLog,
    ) -> Result<String, FlowError> {
        let api_key = request.credentials.deepseek()?;
        log.push(DEEPSEEK, format!("Requesting HTML from {}", self.llm.model()));
        let messages = [
            Message::system(CODEGEN_SYSTEM_PROMPT),
            Message::user(request.prompt.clone()),
        ];
        let reply = self.llm.complete(&messages, api_key).await?;
        log.push(DEEPSEEK, format!("Received {} chars", reply.len()));

        if find_markup(&reply).is_none() {
            log.push(SYSTEM, "No complete HTML document in response, wrapping it");
        }
        Ok(extract_code_fragment(&reply, KnownIds::default()))
    }
}
