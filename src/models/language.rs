use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// 支持的语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Zh,
    En,
}

impl Language {
    /// 语言代码
    pub fn code(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }

    /// 提示词中使用的语言名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Zh => "中文",
            Language::En => "英文",
        }
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "zh-cn" | "chinese" | "中文" => Ok(Language::Zh),
            "en" | "en-us" | "english" | "英文" => Ok(Language::En),
            other => Err(ConfigError::invalid_value(
                "language",
                format!("不支持的语言: {}", other),
            )),
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 翻译方向（中英互译）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: Language,
    pub target: Language,
}

impl LanguagePair {
    pub const ZH_TO_EN: LanguagePair = LanguagePair {
        source: Language::Zh,
        target: Language::En,
    };

    pub const EN_TO_ZH: LanguagePair = LanguagePair {
        source: Language::En,
        target: Language::Zh,
    };

    pub fn new(source: Language, target: Language) -> Result<Self, ConfigError> {
        if source == target {
            return Err(ConfigError::invalid_value(
                "source_lang/target_lang",
                "源语言和目标语言不能相同",
            ));
        }
        Ok(Self { source, target })
    }

    /// 术语表按“中文 → 英文”存放，英译中时需要反转
    pub fn glossary_reversed(&self) -> bool {
        self.source == Language::En
    }
}

impl Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.source, self.target)
    }
}
