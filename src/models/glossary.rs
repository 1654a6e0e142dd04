use serde::{Deserialize, Serialize};

/// 术语条目
///
/// 同一个术语表内源术语唯一，加载后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyEntry {
    pub source_term: String,
    pub target_term: String,
}

impl TerminologyEntry {
    pub fn new(source_term: impl Into<String>, target_term: impl Into<String>) -> Self {
        Self {
            source_term: source_term.into(),
            target_term: target_term.into(),
        }
    }

    /// 反转方向（英译中时使用）
    pub fn reversed(self) -> Self {
        Self {
            source_term: self.target_term,
            target_term: self.source_term,
        }
    }
}
