use std::fmt;

use serde::{Deserialize, Serialize};

/// 未提供置信度时的默认值
pub const DEFAULT_FINDING_CONFIDENCE: u8 = 50;

/// 严重程度，按优先级从高到低排列：critical > high > moderate > low
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    /// 未给出或无法识别时的取值
    #[default]
    Moderate,
    Low,
}

impl Severity {
    /// 优先级顺序，用于摘要文本和分组展示
    pub const PRIORITY_ORDER: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Moderate,
        Severity::Low,
    ];

    /// 宽松解析模型返回的严重程度文本
    ///
    /// 无法识别时返回 `None`，由调用方决定默认值。
    pub fn parse_loose(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "critical" | "urgent" | "emergent" => Some(Severity::Critical),
            "high" | "severe" => Some(Severity::High),
            "moderate" | "medium" => Some(Severity::Moderate),
            "low" | "mild" | "minor" => Some(Severity::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Moderate => "moderate",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从单个批次回复中提取的一条结构化发现
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// `finding-{批次编号}-{批次内序号}`
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub location: Option<String>,
    /// 0–100
    pub confidence: u8,
    /// 来源批次中所有影像的 ID
    pub related_images: Vec<String>,
}

impl Finding {
    pub fn make_id(batch_number: u32, ordinal: usize) -> String {
        format!("finding-{}-{}", batch_number, ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loose_accepts_synonyms_and_case() {
        assert_eq!(Severity::parse_loose(" CRITICAL "), Some(Severity::Critical));
        assert_eq!(Severity::parse_loose("Medium"), Some(Severity::Moderate));
        assert_eq!(Severity::parse_loose("mild"), Some(Severity::Low));
        assert_eq!(Severity::parse_loose("unknown"), None);
    }

    #[test]
    fn test_default_is_moderate() {
        assert_eq!(Severity::default(), Severity::Moderate);
    }

    #[test]
    fn test_priority_order() {
        let names: Vec<&str> = Severity::PRIORITY_ORDER.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["critical", "high", "moderate", "low"]);
    }
}
