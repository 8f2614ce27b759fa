//! 推理请求的提示词

/// 系统消息
pub const SYSTEM_MESSAGE: &str = "You are an expert radiology assistant. You review batches of \
medical images and describe observable findings in structured JSON. You never invent patient \
history and you state uncertainty through the confidence field.";

/// 未提供自定义指令时使用的默认指令
pub const DEFAULT_INSTRUCTION: &str = r#"Analyze the attached medical images and identify any abnormalities or notable observations.

Respond with a single JSON object using exactly this shape:
{
  "summary": "short overview of this batch",
  "findings": [
    {
      "description": "what was observed",
      "severity": "low | moderate | high | critical",
      "location": "anatomical location, if applicable",
      "confidence": 0-100
    }
  ],
  "recommendations": ["follow-up action", "..."],
  "confidence": 0-100
}

If nothing abnormal is visible, return an empty findings array."#;

/// 构建用户消息的文本部分：批次位置 + 指令
pub fn build_batch_text(batch_number: u32, total_batches: u32, instruction: Option<&str>) -> String {
    let instruction = instruction
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION);

    format!(
        "This is batch {} of {} in a single imaging study.\n\n{}",
        batch_number, total_batches, instruction
    )
}
