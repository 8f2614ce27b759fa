//! 批次回复解析 - 业务能力层
//!
//! 模型回复是外部可控的半可信文本：可能包在 Markdown 代码块里，
//! 可能前后夹杂说明文字，字段可能缺失或类型不对。
//! 这里只负责把一段回复解析成 [`ParsedReply`]，不关心批次和报告。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ReplyParseError;
use crate::models::{Severity, DEFAULT_FINDING_CONFIDENCE};

/// 解析后的单条发现（尚未绑定批次）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFinding {
    pub description: String,
    pub severity: Severity,
    pub location: Option<String>,
    pub confidence: u8,
}

/// 解析后的批次回复
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedReply {
    pub summary: Option<String>,
    pub findings: Vec<ParsedFinding>,
    pub recommendations: Vec<String>,
    /// 缺失或无法解析为数字时为 `None`
    pub confidence: Option<f64>,
}

/// 解析一段模型回复
pub fn parse_reply(raw: &str) -> Result<ParsedReply, ReplyParseError> {
    let object = extract_json_object(raw)?;

    Ok(ParsedReply {
        summary: object
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        findings: parse_findings(&object),
        recommendations: parse_recommendations(&object),
        confidence: object.get("confidence").and_then(parse_number),
    })
}

/// 从回复中提取第一个完整的 JSON 对象
///
/// 优先在 ```json 代码块里找，找不到再扫描全文。
/// 从每个 `{` 起尝试流式解析：对象之后的文字忽略，解析不了的 `{` 跳过。
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, ReplyParseError> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok());

    let fenced = fence
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .and_then(|m| first_object(m.as_str()).ok());
    if let Some(object) = fenced {
        return Ok(object);
    }

    first_object(raw)
}

/// 全部候选都失败时返回第一个语法错误
fn first_object(text: &str) -> Result<Map<String, Value>, ReplyParseError> {
    let mut first_error = None;

    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(object))) => return Ok(object),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            _ => {}
        }
    }

    Err(first_error.map_or(ReplyParseError::NoJsonObject, ReplyParseError::InvalidJson))
}

fn parse_findings(object: &Map<String, Value>) -> Vec<ParsedFinding> {
    let Some(items) = object.get("findings").and_then(Value::as_array) else {
        return Vec::new();
    };

    items.iter().filter_map(parse_finding).collect()
}

fn parse_finding(item: &Value) -> Option<ParsedFinding> {
    match item {
        // 纯字符串当作描述
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| ParsedFinding {
                description: text.to_string(),
                severity: Severity::default(),
                location: None,
                confidence: DEFAULT_FINDING_CONFIDENCE,
            })
        }
        Value::Object(fields) => {
            let description = fields
                .get("description")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("Unspecified finding")
                .to_string();

            let severity = fields
                .get("severity")
                .and_then(Value::as_str)
                .and_then(Severity::parse_loose)
                .unwrap_or_default();

            let location = fields
                .get("location")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            let confidence = fields
                .get("confidence")
                .and_then(parse_number)
                .map(to_percent)
                .unwrap_or(DEFAULT_FINDING_CONFIDENCE);

            Some(ParsedFinding {
                description,
                severity,
                location,
                confidence,
            })
        }
        _ => None,
    }
}

fn parse_recommendations(object: &Map<String, Value>) -> Vec<String> {
    match object.get("recommendations") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => {
            vec![single.trim().to_string()]
        }
        _ => Vec::new(),
    }
}

/// 数字或数字字符串（允许 `"85"`、`"85%"`），其他情况返回 `None`
fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// 四舍五入并限制到 0–100
pub fn to_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
