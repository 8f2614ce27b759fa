pub mod prompt;
pub mod reply_parser;
pub mod report_formatter;
pub mod vision_service;

pub use reply_parser::{parse_reply, ParsedFinding, ParsedReply};
pub use report_formatter::format_report_text;
pub use vision_service::{BatchRequest, InferenceClient, VisionService};
