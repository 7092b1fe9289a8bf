//! 结果提取：从上游自由文本 / JSON 中尽力抽取项目 id、界面 id 与 HTML
//!
//! 上游响应没有稳定 schema，这里的策略是「总能产出可展示内容」：
//! 找不到标识返回 None，找不到 HTML 根标签时合成占位页面。全部为纯函数。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// 需要抽取的标识种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPattern {
    /// `projects/<id>`，或 JSON 中的 `projectId`
    Project,
    /// `screens/<id>`，或 JSON 中的 `screenId`
    Screen,
}

impl IdPattern {
    fn regex(self) -> &'static Regex {
        static PROJECT_RE: OnceLock<Regex> = OnceLock::new();
        static SCREEN_RE: OnceLock<Regex> = OnceLock::new();
        match self {
            IdPattern::Project => {
                PROJECT_RE.get_or_init(|| Regex::new(r"projects/([A-Za-z0-9_-]+)").unwrap())
            }
            IdPattern::Screen => {
                SCREEN_RE.get_or_init(|| Regex::new(r"screens/([A-Za-z0-9_-]+)").unwrap())
            }
        }
    }

    fn json_key(self) -> &'static str {
        match self {
            IdPattern::Project => "projectId",
            IdPattern::Screen => "screenId",
        }
    }
}

/// 流程已知的标识，用于占位页面
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownIds<'a> {
    pub project_id: Option<&'a str>,
    pub screen_id: Option<&'a str>,
}

/// 抽取第一个匹配的标识；缺失是正常结果，返回 None
pub fn extract_identifier(raw: &str, pattern: IdPattern) -> Option<String> {
    if let Some(cap) = pattern.regex().captures(raw) {
        return cap.get(1).map(|m| m.as_str().to_string());
    }
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    find_json_key(&value, pattern.json_key())
}

fn find_json_key(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(v) = map.get(key) {
                match v {
                    Value::String(s) if !s.trim().is_empty() => return Some(s.trim().to_string()),
                    Value::Number(n) => return Some(n.to_string()),
                    _ => {}
                }
            }
            map.values().find_map(|v| find_json_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_json_key(v, key)),
        _ => None,
    }
}

fn document_re() -> &'static Regex {
    static DOCUMENT_RE: OnceLock<Regex> = OnceLock::new();
    DOCUMENT_RE.get_or_init(|| {
        Regex::new(r"(?is)(?:<!doctype\s+html[^>]*>\s*)?<html\b.*</html\s*>").unwrap()
    })
}

fn fence_re() -> &'static Regex {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    FENCE_RE.get_or_init(|| Regex::new(r"(?s)```(?:html|HTML)\s*\n(.*?)```").unwrap())
}

/// 查找完整 HTML 文档（`<html>...</html>`，可带 doctype）。
/// 响应是 JSON 时先查解码后的字符串值（如 htmlCode 字段），避免返回带转义符的原文
pub fn find_markup(raw: &str) -> Option<String> {
    let document = |text: &str| document_re().find(text).map(|m| m.as_str().to_string());
    search_decoded(raw, document)
}

/// ```html 代码块的内容（去掉首尾空白，空块视为没有）
fn find_fence(raw: &str) -> Option<String> {
    let fence = |text: &str| {
        fence_re()
            .captures(text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|body| !body.is_empty())
    };
    search_decoded(raw, fence)
}

/// 先在 JSON 字符串值里找，再退回原文
fn search_decoded(raw: &str, find: impl Fn(&str) -> Option<String> + Copy) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        if let Some(found) = find_in_strings(&value, find) {
            return Some(found);
        }
    }
    find(raw)
}

fn find_in_strings(value: &Value, find: impl Fn(&str) -> Option<String> + Copy) -> Option<String> {
    match value {
        Value::String(s) => find(s),
        Value::Object(map) => map.values().find_map(|v| find_in_strings(v, find)),
        Value::Array(items) => items.iter().find_map(|v| find_in_strings(v, find)),
        _ => None,
    }
}

/// 抽取可展示代码：完整文档原样返回；```html 片段包成文档；否则合成占位页面
pub fn extract_code_fragment(raw: &str, ids: KnownIds<'_>) -> String {
    if let Some(doc) = find_markup(raw) {
        return doc;
    }
    if let Some(body) = find_fence(raw) {
        return wrap_fragment(&body);
    }
    placeholder_document(raw, ids)
}

fn wrap_fragment(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n</head>\n\
         <body>\n{body}\n</body>\n</html>"
    )
}

const PLACEHOLDER_DETAIL_CHARS: usize = 2000;

/// 占位页面：展示已知的项目 / 界面 id 与原始响应摘要
pub fn placeholder_document(raw: &str, ids: KnownIds<'_>) -> String {
    let project = ids.project_id.map(escape_html).unwrap_or_else(|| "-".to_string());
    let screen = ids.screen_id.map(escape_html).unwrap_or_else(|| "-".to_string());
    let detail: String = raw.chars().take(PLACEHOLDER_DETAIL_CHARS).collect();
    let detail = escape_html(detail.trim());

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Design generated</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; color: #1f2937; }}
dl {{ display: grid; grid-template-columns: max-content 1fr; gap: .25rem 1rem; }}
pre {{ background: #f3f4f6; padding: 1rem; white-space: pre-wrap; word-break: break-all; }}
</style>
</head>
<body>
<h1>Design generated</h1>
<p>The service did not return HTML for this screen. Open it in Stitch to view the design.</p>
<dl>
<dt>Project</dt><dd>{project}</dd>
<dt>Screen</dt><dd>{screen}</dd>
</dl>
<pre>{detail}</pre>
</body>
</html>"#
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_from_path() {
        let raw = "Created project projects/abc123 titled Weaver";
        assert_eq!(extract_identifier(raw, IdPattern::Project).as_deref(), Some("abc123"));
        assert_eq!(extract_identifier(raw, IdPattern::Screen), None);
    }

    #[test]
    fn test_identifier_first_match_wins() {
        let raw = r#"{"name":"projects/111/screens/s-1","other":"screens/s-2"}"#;
        assert_eq!(extract_identifier(raw, IdPattern::Screen).as_deref(), Some("s-1"));
        assert_eq!(extract_identifier(raw, IdPattern::Project).as_deref(), Some("111"));
    }

    #[test]
    fn test_identifier_from_json_key() {
        let raw = r#"{"screens":[{"screenId":"  9f8e  "}],"meta":{"projectId":4044680601076201931}}"#;
        assert_eq!(extract_identifier(raw, IdPattern::Screen).as_deref(), Some("9f8e"));
        assert_eq!(
            extract_identifier(raw, IdPattern::Project).as_deref(),
            Some("4044680601076201931")
        );
    }

    #[test]
    fn test_identifier_absent_is_none() {
        assert_eq!(extract_identifier("", IdPattern::Project), None);
        assert_eq!(extract_identifier("no ids here", IdPattern::Project), None);
        assert_eq!(extract_identifier("{not json", IdPattern::Screen), None);
    }

    #[test]
    fn test_markup_verbatim() {
        let html = "<html><body><h1>Todo</h1></body></html>";
        assert_eq!(extract_code_fragment(html, KnownIds::default()), html);

        let wrapped = format!("Here is your screen:\n<!DOCTYPE html>\n{html}\nEnjoy");
        assert_eq!(
            extract_code_fragment(&wrapped, KnownIds::default()),
            format!("<!DOCTYPE html>\n{html}")
        );
    }

    #[test]
    fn test_markup_inside_json_string() {
        let raw = serde_json::json!({
            "screen": {"htmlCode": "<HTML lang=\"en\"><body>x</body></HTML>"}
        })
        .to_string();
        assert_eq!(
            find_markup(&raw).as_deref(),
            Some("<HTML lang=\"en\"><body>x</body></HTML>")
        );
    }

    #[test]
    fn test_escaped_markup_is_decoded() {
        let html = "<!DOCTYPE html>\n<html lang=\"en\">\n<body class=\"app\">x</body>\n</html>";
        let raw = serde_json::json!({"screen": {"name": "screens/s1", "htmlCode": html}}).to_string();
        let code = extract_code_fragment(&raw, KnownIds::default());
        assert_eq!(code, html);
        assert!(!code.contains("\\\""));
        assert!(!code.contains("\\n"));
    }

    #[test]
    fn test_fence_inside_json_string() {
        let raw = serde_json::json!({"output": "Done\n```html\n<p class=\"a\">hi</p>\n```"}).to_string();
        let code = extract_code_fragment(&raw, KnownIds::default());
        assert!(code.starts_with("<!DOCTYPE html>"));
        assert!(code.contains("<p class=\"a\">hi</p>"));
    }

    #[test]
    fn test_fenced_fragment_is_wrapped() {
        let raw = "Sure!\n```html\n<div class=\"todo\">hi</div>\n```\n";
        let code = extract_code_fragment(raw, KnownIds::default());
        assert!(code.starts_with("<!DOCTYPE html>"));
        assert!(code.contains("<div class=\"todo\">hi</div>"));
        assert!(find_markup(&code).is_some());
    }

    #[test]
    fn test_placeholder_contains_ids_and_escapes() {
        let ids = KnownIds {
            project_id: Some("abc123"),
            screen_id: Some("xyz789"),
        };
        let code = extract_code_fragment("{\"status\":\"<pending>\"}", ids);
        assert!(!code.is_empty());
        assert!(code.contains("abc123"));
        assert!(code.contains("xyz789"));
        assert!(code.contains("&lt;pending&gt;"));
        assert!(!code.contains("<pending>"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let ids = KnownIds {
            project_id: Some("p"),
            screen_id: None,
        };
        for raw in ["<html>a</html>", "plain text", "```html\n<p>x</p>\n```", ""] {
            assert_eq!(extract_code_fragment(raw, ids), extract_code_fragment(raw, ids));
        }
    }
}
