//! Stitch MCP 工具目录：工具名与参数组装

use serde_json::{json, Value};

/// 流程用到的三个远程工具
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchTool {
    CreateProject,
    GenerateScreen,
    GetScreen,
}

impl StitchTool {
    pub fn name(self) -> &'static str {
        match self {
            StitchTool::CreateProject => "create_project",
            StitchTool::GenerateScreen => "generate_screen_from_text",
            StitchTool::GetScreen => "get_screen",
        }
    }
}

/// 生成参数：设备形态与模型
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub device_type: String,
    pub model_id: String,
}

pub fn create_project_args(title: &str) -> Value {
    json!({ "title": title })
}

pub fn generate_screen_args(project_id: &str, prompt: &str, params: &GenerationParams) -> Value {
    json!({
        "projectId": project_id,
        "prompt": prompt,
        "deviceType": params.device_type,
        "modelId": params.model_id,
    })
}

pub fn get_screen_args(project_id: &str, screen_id: &str) -> Value {
    json!({
        "name": format!("projects/{project_id}/screens/{screen_id}"),
        "projectId": project_id,
        "screenId": screen_id,
    })
}

/// 基于时间戳的项目标题
pub fn project_title(now: chrono::DateTime<chrono::Local>) -> String {
    format!("Weaver {}", now.format("%Y-%m-%d %H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_args() {
        let params = GenerationParams {
            device_type: "MOBILE".into(),
            model_id: "GEMINI_3_FLASH".into(),
        };
        let v = generate_screen_args("p1", "a todo list", &params);
        assert_eq!(v["projectId"], "p1");
        assert_eq!(v["deviceType"], "MOBILE");
        assert_eq!(v["modelId"], "GEMINI_3_FLASH");
    }

    #[test]
    fn test_get_screen_args_carry_resource_name() {
        let v = get_screen_args("abc123", "xyz789");
        assert_eq!(v["name"], "projects/abc123/screens/xyz789");
    }

    #[test]
    fn test_project_title_is_timestamped() {
        let now = chrono::Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(project_title(now), "Weaver 2026-01-02 03:04:05");
    }
}
