use std::path::{Path, PathBuf};
use thiserror::Error;

/// 应用程序错误类型
///
/// 只有配置错误和持久化错误会向上传播；
/// 单元格级别的翻译错误在编排层被吸收并记录到检查点。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（术语表、表格结构、参数）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 持久化错误（检查点、缓存不可写）
    #[error("持久化错误: {0}")]
    Persistence(#[from] PersistenceError),
}

/// 配置错误
///
/// 在开始处理任何单元格之前发现，属于致命错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 术语为空
    #[error("术语表第 {row} 行: 术语为空")]
    EmptyTerm { row: usize },

    /// 源术语重复
    #[error("术语表第 {row} 行: 源术语 '{term}' 重复")]
    DuplicateTerm { row: usize, term: String },

    /// 术语指向自身或互相指向
    #[error("术语表第 {row} 行: 术语 '{term}' 存在循环引用")]
    CircularTerm { row: usize, term: String },

    /// 表格结构不满足要求
    #[error("表格无效 ({path}): {reason}")]
    InvalidSheet { path: String, reason: String },

    /// 参数无效
    #[error("参数 {name} 无效: {reason}")]
    InvalidValue { name: String, reason: String },

    /// 配置文件读取或解析失败
    #[error("配置文件无效 ({path}): {reason}")]
    InvalidFile { path: String, reason: String },
}

/// 单元格翻译错误
///
/// 翻译客户端只需把失败归为两类，编排层据此决定是否重试
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellTranslationError {
    /// 可重试（限流、超时、5xx）
    #[error("临时错误: {0}")]
    Transient(String),
    /// 不可重试（输入无效、鉴权失败、内容被拒）
    #[error("永久错误: {0}")]
    Permanent(String),
}

impl CellTranslationError {
    pub fn transient(msg: impl Into<String>) -> Self {
        CellTranslationError::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        CellTranslationError::Permanent(msg.into())
    }

    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, CellTranslationError::Transient(_))
    }

    /// 错误描述（不带分类前缀）
    pub fn message(&self) -> &str {
        match self {
            CellTranslationError::Transient(msg) | CellTranslationError::Permanent(msg) => msg,
        }
    }
}

/// 持久化错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// 读取失败
    #[error("读取失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 写入失败
    #[error("写入失败 ({path}): {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化失败
    #[error("序列化失败 ({path}): {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// 表格读写失败
    #[error("表格读写失败 ({path}): {source}")]
    Sheet {
        path: String,
        #[source]
        source: csv::Error,
    },
}

// ========== 便捷构造函数 ==========

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl PersistenceError {
    /// 创建读取错误
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        PersistenceError::Read {
            path: display(path),
            source,
        }
    }

    /// 创建写入错误
    pub fn write(path: &Path, source: std::io::Error) -> Self {
        PersistenceError::Write {
            path: display(path),
            source,
        }
    }

    /// 创建序列化错误
    pub fn serialize(path: &Path, source: serde_json::Error) -> Self {
        PersistenceError::Serialize {
            path: display(path),
            source,
        }
    }

    /// 创建表格读写错误
    pub fn sheet(path: &Path, source: csv::Error) -> Self {
        PersistenceError::Sheet {
            path: display(path),
            source,
        }
    }
}

impl ConfigError {
    /// 创建参数错误
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 创建表格结构错误
    pub fn invalid_sheet(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSheet {
            path: path.into().display().to_string(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        assert!(CellTranslationError::transient("429").is_retryable());
        assert!(!CellTranslationError::permanent("401").is_retryable());
    }

    #[test]
    fn test_message_strips_category() {
        let err = CellTranslationError::permanent("内容被拒绝");
        assert_eq!(err.message(), "内容被拒绝");
        assert_eq!(err.to_string(), "永久错误: 内容被拒绝");
    }

    #[test]
    fn test_config_error_converts_into_app_error() {
        let err: AppError = ConfigError::invalid_value("max_attempts", "必须大于 0").into();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("max_attempts"));
    }
}
