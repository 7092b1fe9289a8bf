//! Weaver - 提示词到预览页面的生成服务
//!
//! 模块划分：
//! - **api**: HTTP 路由（POST /api/generate 等）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、流程状态、编排器（线性状态机）
//! - **extract**: 从上游自由文本中提取 id 与 HTML
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **service**: 请求校验与凭据解析
//! - **tools**: MCP JSON-RPC 工具调用（Stitch）

pub mod api;
pub mod config;
pub mod core;
pub mod extract;
pub mod llm;
pub mod observability;
pub mod service;
pub mod tools;

pub use crate::core::{FlowError, FlowResult, Orchestrator};
pub use service::{CredentialOverrides, GenerateService};
