//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEAVER__*` 覆盖（双下划线表示嵌套，如 `WEAVER__STITCH__PROJECT_ID=123`）。
//! 最后若凭据仍未设置，回退读取常用环境变量 `STITCH_API_KEY` / `STITCH_PROJECT_ID` / `DEEPSEEK_API_KEY`。
//!
//! 配置只在启动时加载一次，之后以只读方式传入 GenerateService，编排层不再读取任何全局状态。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub stitch: StitchSection,
    #[serde(default)]
    pub deepseek: DeepSeekSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

/// [server] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Stitch MCP 的鉴权头形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `X-Goog-Api-Key: <key>`
    #[default]
    ApiKey,
    /// `Authorization: Bearer <token>`
    Bearer,
}

/// [stitch] 段：MCP 端点、默认凭据、默认项目与生成参数
#[derive(Debug, Clone, Deserialize)]
pub struct StitchSection {
    #[serde(default = "default_stitch_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    /// 设置后复用该项目，不再调用 create_project
    pub project_id: Option<String>,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_stitch_model")]
    pub model_id: String,
    #[serde(default)]
    pub auth: AuthScheme,
    /// 传输层超时（秒）；生成界面较慢，默认给足时间
    #[serde(default = "default_stitch_timeout")]
    pub timeout_secs: u64,
}

impl Default for StitchSection {
    fn default() -> Self {
        Self {
            endpoint: default_stitch_endpoint(),
            api_key: None,
            project_id: None,
            device_type: default_device_type(),
            model_id: default_stitch_model(),
            auth: AuthScheme::default(),
            timeout_secs: default_stitch_timeout(),
        }
    }
}

fn default_stitch_endpoint() -> String {
    "https://stitch.googleapis.com/mcp".to_string()
}

fn default_device_type() -> String {
    "DESKTOP".to_string()
}

fn default_stitch_model() -> String {
    "GEMINI_3_PRO".to_string()
}

fn default_stitch_timeout() -> u64 {
    180
}

/// [deepseek] 段：OpenAI 兼容端点与模型
#[derive(Debug, Clone, Deserialize)]
pub struct DeepSeekSection {
    #[serde(default = "default_deepseek_base_url")]
    pub base_url: String,
    #[serde(default = "default_deepseek_model")]
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for DeepSeekSection {
    fn default() -> Self {
        Self {
            base_url: default_deepseek_base_url(),
            model: default_deepseek_model(),
            api_key: None,
        }
    }
}

fn default_deepseek_base_url() -> String {
    crate::llm::DEEPSEEK_BASE_URL.to_string()
}

fn default_deepseek_model() -> String {
    crate::llm::DEEPSEEK_CHAT.to_string()
}

/// 代码来源：Stitch 设计稿 / DeepSeek 直接生成 / Stitch 设计 + DeepSeek 转代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Stitch,
    Deepseek,
    Hybrid,
}

impl Backend {
    pub fn needs_stitch(self) -> bool {
        matches!(self, Backend::Stitch | Backend::Hybrid)
    }

    pub fn needs_deepseek(self) -> bool {
        matches!(self, Backend::Deepseek | Backend::Hybrid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Stitch => "stitch",
            Backend::Deepseek => "deepseek",
            Backend::Hybrid => "hybrid",
        }
    }
}

/// [generation] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GenerationSection {
    #[serde(default)]
    pub backend: Backend,
}

impl AppConfig {
    /// 用常用环境变量补齐未配置的凭据与项目 id（不覆盖已有值）
    pub fn with_env_fallbacks(mut self) -> Self {
        self.apply_fallbacks(|name| std::env::var(name).ok());
        self
    }

    fn apply_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if blank(&self.stitch.api_key) {
            self.stitch.api_key = lookup("STITCH_API_KEY");
        }
        if blank(&self.stitch.project_id) {
            self.stitch.project_id = lookup("STITCH_PROJECT_ID");
        }
        if blank(&self.deepseek.api_key) {
            self.deepseek.api_key = lookup("DEEPSEEK_API_KEY");
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// 从 config 目录加载配置，环境变量 WEAVER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 WEAVER__*（双下划线表示嵌套键）
/// 4. 用 STITCH_API_KEY 等常用环境变量补齐空缺
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WEAVER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    let cfg: AppConfig = c.try_deserialize()?;
    Ok(cfg.with_env_fallbacks())
}
