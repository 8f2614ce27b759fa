use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量
#[derive(Clone, Debug)]
pub struct Config {
    /// 每批影像数量上限
    pub batch_size: usize,
    /// 相邻两批之间的间隔（毫秒）
    pub pacing_delay_ms: u64,
    /// 单次推理调用超时（秒）
    pub request_timeout_secs: u64,
    /// 影像所在目录
    pub image_folder: String,
    /// 报告输出目录
    pub report_output_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 20,
            pacing_delay_ms: 2000,
            request_timeout_secs: 300,
            image_folder: "images".to_string(),
            report_output_dir: "reports".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_temperature: 0.2,
            llm_max_tokens: 4096,
        }
    }
}

/// 配置文件中的字段全部可选，缺省时保留上一层的值
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    batch_size: Option<usize>,
    pacing_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    image_folder: Option<String>,
    report_output_dir: Option<String>,
    verbose_logging: Option<bool>,
    llm_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_model_name: Option<String>,
    llm_temperature: Option<f32>,
    llm_max_tokens: Option<u32>,
}

impl Config {
    /// 从 TOML 文本解析，未出现的键使用默认值
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;
        let mut config = Self::default();
        config.apply_file(file);
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 默认值 → 配置文件（存在时）→ 环境变量，最后校验
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load(p)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 用环境变量覆盖，解析失败返回错误
    ///
    /// `lookup` 便于测试时注入变量表。
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "BATCH_SIZE", "usize")? {
            self.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "PACING_DELAY_MS", "u64")? {
            self.pacing_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", "u64")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        if let Some(v) = parse_var(&lookup, "LLM_TEMPERATURE", "f32")? {
            self.llm_temperature = v;
        }
        if let Some(v) = parse_var(&lookup, "LLM_MAX_TOKENS", "u32")? {
            self.llm_max_tokens = v;
        }
        if let Some(v) = lookup("IMAGE_FOLDER") {
            self.image_folder = v;
        }
        if let Some(v) = lookup("REPORT_OUTPUT_DIR") {
            self.report_output_dir = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = lookup("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.pacing_delay_ms {
            self.pacing_delay_ms = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.image_folder {
            self.image_folder = v;
        }
        if let Some(v) = file.report_output_dir {
            self.report_output_dir = v;
        }
        if let Some(v) = file.verbose_logging {
            self.verbose_logging = v;
        }
        if let Some(v) = file.llm_api_key {
            self.llm_api_key = v;
        }
        if let Some(v) = file.llm_api_base_url {
            self.llm_api_base_url = v;
        }
        if let Some(v) = file.llm_model_name {
            self.llm_model_name = v;
        }
        if let Some(v) = file.llm_temperature {
            self.llm_temperature = v;
        }
        if let Some(v) = file.llm_max_tokens {
            self.llm_max_tokens = v;
        }
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "必须大于 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "必须大于 0"));
        }
        if self.llm_model_name.trim().is_empty() {
            return Err(invalid("llm_model_name", "不能为空"));
        }
        Ok(())
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, expected_type: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = Config::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.pacing_delay(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let config = Config::from_toml_str(
            r#"
            batch_size = 5
            llm_model_name = "vision-large"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.llm_model_name, "vision-large");
        assert_eq!(config.pacing_delay_ms, 2000);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(Config::from_toml_str("batchsize = 5").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_toml_str("batch_size = 5").unwrap();
        let vars: HashMap<&str, &str> = [("BATCH_SIZE", "7"), ("LLM_API_KEY", "secret")].into();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.llm_api_key, "secret");
    }

    #[test]
    fn test_env_parse_failure_names_variable() {
        let mut config = Config::default();
        let err = config
            .apply_env(|name| (name == "PACING_DELAY_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PACING_DELAY_MS"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "batch_size"
        ));
    }
}
