use crate::error::ConfigError;
use crate::models::LanguagePair;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时进行的翻译请求数量
    pub max_concurrent_requests: usize,
    /// 单个单元格每次运行的最大尝试次数
    pub max_attempts: u32,
    /// 首次重试前的等待时间（毫秒）
    pub backoff_initial_ms: u64,
    /// 每次重试等待时间的倍数
    pub backoff_multiplier: f64,
    /// 重试等待时间上限（毫秒）
    pub backoff_max_ms: u64,
    /// 每完成多少个单元格保存一次检查点
    pub flush_every_cells: usize,
    /// 距上次保存超过多少秒时保存检查点
    pub flush_interval_secs: u64,
    /// 忽略检查点和缓存，强制重新翻译
    pub force_retranslate: bool,
    /// 开始前删除已有检查点
    pub reset_checkpoint: bool,
    /// 源语言（不设置时根据表头检测）
    pub source_lang: Option<String>,
    /// 目标语言（不设置时根据表头检测）
    pub target_lang: Option<String>,
    /// 待翻译表格目录
    pub input_dir: String,
    /// 输出目录
    pub output_dir: String,
    /// 缓存和检查点目录
    pub cache_dir: String,
    /// 术语表文件
    pub glossary_file: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 翻译失败的单元格报告
    pub failure_report_file: String,
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
            max_concurrent_requests: 4,
            max_attempts: 3,
            backoff_initial_ms: 1000,
            backoff_multiplier: 2.0,
            backoff_max_ms: 30_000,
            flush_every_cells: 5,
            flush_interval_secs: 30,
            force_retranslate: false,
            reset_checkpoint: false,
            source_lang: None,
            target_lang: None,
            input_dir: "input".to_string(),
            output_dir: "output".to_string(),
            cache_dir: "cache".to_string(),
            glossary_file: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            failure_report_file: "failed_cells.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 2048,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件（如果存在）→ 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_toml_file(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::InvalidFile { reason, .. } => ConfigError::InvalidFile {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFile {
            path: String::new(),
            reason: e.to_string(),
        })
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(&mut self) {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = parsed("MAX_CONCURRENT_REQUESTS") {
            self.max_concurrent_requests = v;
        }
        if let Some(v) = parsed("MAX_ATTEMPTS") {
            self.max_attempts = v;
        }
        if let Some(v) = parsed("BACKOFF_INITIAL_MS") {
            self.backoff_initial_ms = v;
        }
        if let Some(v) = parsed("BACKOFF_MULTIPLIER") {
            self.backoff_multiplier = v;
        }
        if let Some(v) = parsed("BACKOFF_MAX_MS") {
            self.backoff_max_ms = v;
        }
        if let Some(v) = parsed("FLUSH_EVERY_CELLS") {
            self.flush_every_cells = v;
        }
        if let Some(v) = parsed("FLUSH_INTERVAL_SECS") {
            self.flush_interval_secs = v;
        }
        if let Some(v) = parsed("FORCE_RETRANSLATE") {
            self.force_retranslate = v;
        }
        if let Some(v) = parsed("RESET_CHECKPOINT") {
            self.reset_checkpoint = v;
        }
        if let Ok(v) = std::env::var("SOURCE_LANG") {
            self.source_lang = Some(v);
        }
        if let Ok(v) = std::env::var("TARGET_LANG") {
            self.target_lang = Some(v);
        }
        if let Ok(v) = std::env::var("INPUT_DIR") {
            self.input_dir = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_DIR") {
            self.output_dir = v;
        }
        if let Ok(v) = std::env::var("CACHE_DIR") {
            self.cache_dir = v;
        }
        if let Ok(v) = std::env::var("GLOSSARY_FILE") {
            self.glossary_file = Some(v);
        }
        if let Some(v) = parsed("VERBOSE_LOGGING") {
            self.verbose_logging = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        if let Ok(v) = std::env::var("FAILURE_REPORT_FILE") {
            self.failure_report_file = v;
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Ok(v) = std::env::var("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        if let Some(v) = parsed("LLM_TEMPERATURE") {
            self.llm_temperature = v;
        }
        if let Some(v) = parsed("LLM_MAX_TOKENS") {
            self.llm_max_tokens = v;
        }
    }

    /// 检查参数取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid_value(
                "max_concurrent_requests",
                "必须大于 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid_value("max_attempts", "必须大于 0"));
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err(ConfigError::invalid_value(
                "backoff_multiplier",
                "必须不小于 1.0",
            ));
        }
        if self.flush_every_cells == 0 {
            return Err(ConfigError::invalid_value("flush_every_cells", "必须大于 0"));
        }
        if self.source_lang.is_some() != self.target_lang.is_some() {
            return Err(ConfigError::invalid_value(
                "source_lang/target_lang",
                "必须同时设置",
            ));
        }
        self.language_pair()?;
        Ok(())
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// 配置中指定的翻译方向
    pub fn language_pair(&self) -> Result<Option<LanguagePair>, ConfigError> {
        match (&self.source_lang, &self.target_lang) {
            (Some(source), Some(target)) => {
                Ok(Some(LanguagePair::new(source.parse()?, target.parse()?)?))
            }
            _ => Ok(None),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        Path::new(&self.cache_dir).join("translation_cache.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            max_attempts = 5
            llm_model_name = "doubao-seed-1.6"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.llm_model_name, "doubao-seed-1.6");
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.flush_every_cells, 5);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = Config {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_requires_both_languages() {
        let config = Config {
            source_lang: Some("zh".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_language_pair_override() {
        let config = Config {
            source_lang: Some("en".to_string()),
            target_lang: Some("中文".to_string()),
            ..Default::default()
        };
        assert_eq!(config.language_pair().unwrap(), Some(LanguagePair::EN_TO_ZH));

        let same = Config {
            source_lang: Some("zh".to_string()),
            target_lang: Some("zh".to_string()),
            ..Default::default()
        };
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let result = Config::from_toml_str("max_attempts = \"three\"");
        assert!(matches!(result, Err(ConfigError::InvalidFile { .. })));
    }
}
