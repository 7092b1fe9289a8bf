//! HTTP 接口
//!
//! - POST /api/generate：提示 → 预览 HTML
//! - GET  /api/config：进程是否已配置默认凭据（供前端决定是否要求用户填 Key）
//! - GET  /health

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::{FlowError, FlowResult};
use crate::service::{CredentialOverrides, GenerateService};

/// POST /api/generate 请求体
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub config: Option<RequestConfig>,
    /// 上一次响应返回的续接令牌
    #[serde(default)]
    pub interaction_id: Option<String>,
}

/// 请求级凭据覆盖
#[derive(Debug, Default, Deserialize)]
pub struct RequestConfig {
    #[serde(default, alias = "stitchKey")]
    pub stitch_key: Option<String>,
    #[serde(default, alias = "deepSeekKey")]
    pub deepseek_key: Option<String>,
}

/// POST /api/generate 响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
}

impl From<FlowResult> for GenerateResponse {
    fn from(r: FlowResult) -> Self {
        Self {
            success: r.success,
            logs: r.log.lines(),
            version: r.version(),
            interaction_id: r.continuation.as_ref().map(|t| t.to_string()),
            code: r.code,
            error: r.error,
        }
    }
}

/// GET /api/config 响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigStatus {
    pub backend: String,
    pub stitch_key: bool,
    pub deepseek_key: bool,
    pub project_id: bool,
}

/// 请求在进入编排器之前被拒绝
#[derive(Debug)]
pub struct ApiError(FlowError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FlowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FlowError::CredentialMissing(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.0.to_string();
        tracing::warn!(%status, error = %message, "generate request rejected");
        let body = GenerateResponse {
            success: false,
            logs: vec![format!("[Error] {message}")],
            code: None,
            version: None,
            error: Some(message),
            interaction_id: None,
        };
        (status, Json(body)).into_response()
    }
}

/// 创建路由
pub fn create_router(service: Arc<GenerateService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/config", get(config_status))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// POST /api/generate
///
/// - 200：流程成功，带 code
/// - 502：流程已执行但上游失败（success=false，带 error 与完整 logs）；与网关本身的 500 区分开
/// - 400 / 401：请求在进入编排器前被拒绝（提示为空、令牌无效、缺少凭据）
async fn generate(
    State(service): State<Arc<GenerateService>>,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let config = req.config.unwrap_or_default();
    let overrides = CredentialOverrides {
        stitch: config.stitch_key,
        deepseek: config.deepseek_key,
    };

    let result = service
        .handle(&req.prompt, overrides, req.interaction_id.as_deref())
        .await
        .map_err(ApiError)?;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(result.into())))
}

/// GET /api/config
async fn config_status(State(service): State<Arc<GenerateService>>) -> Json<ConfigStatus> {
    Json(ConfigStatus {
        backend: service.backend().as_str().to_string(),
        stitch_key: service.has_default_stitch_key(),
        deepseek_key: service.has_default_deepseek_key(),
        project_id: service.has_default_project(),
    })
}
