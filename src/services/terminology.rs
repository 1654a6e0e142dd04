//! 术语索引 - 业务能力层
//!
//! 只负责“术语替换”能力：在调用翻译接口之前，
//! 把文本中出现的源术语替换为术语表指定的译法。
//!
//! ## 匹配规则
//!
//! - 从左到右扫描，每个位置优先匹配最长的术语（同长度按术语表顺序）
//! - 已经替换过的文本不会再次参与匹配
//! - 拉丁字母开头/结尾的术语要求单词边界，中文术语可以出现在任何位置

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;
use crate::models::{Language, LanguagePair, TerminologyEntry};

static HAN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Han}").unwrap());

/// 一次替换中命中的术语
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTerm {
    pub source_term: String,
    pub target_term: String,
    /// 在文本中出现的次数
    pub occurrences: usize,
}

/// 替换结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// 按首次出现顺序排列
    pub applied: Vec<AppliedTerm>,
}

impl Substitution {
    /// 替换次数合计
    pub fn replacement_count(&self) -> usize {
        self.applied.iter().map(|t| t.occurrences).sum()
    }
}

/// 术语索引
///
/// 职责：
/// - 加载时校验术语表（空术语、重复、循环引用）
/// - 提供纯函数式的 `apply`，不修改自身
/// - 提供术语表版本，供缓存指纹使用
#[derive(Debug, Clone)]
pub struct TerminologyIndex {
    /// 术语表顺序
    entries: Vec<TerminologyEntry>,
    /// 首字符 → 候选术语下标（按长度降序，再按术语表顺序）
    by_first_char: HashMap<char, Vec<usize>>,
    version: String,
}

impl TerminologyIndex {
    /// 空术语表
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// 从 (源术语, 目标术语) 列表构建索引
    ///
    /// 行号从 1 开始，用于错误提示
    pub fn load<I, S, T>(rows: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut entries: Vec<TerminologyEntry> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (i, (source, target)) in rows.into_iter().enumerate() {
            let row = i + 1;
            let source = source.as_ref().trim();
            let target = target.as_ref().trim();

            if source.is_empty() || target.is_empty() {
                return Err(ConfigError::EmptyTerm { row });
            }
            if source == target {
                return Err(ConfigError::CircularTerm {
                    row,
                    term: source.to_string(),
                });
            }
            if seen.contains_key(source) {
                return Err(ConfigError::DuplicateTerm {
                    row,
                    term: source.to_string(),
                });
            }

            seen.insert(source.to_string(), row);
            entries.push(TerminologyEntry::new(source, target));
        }

        // A → B 且 B → A
        for (i, entry) in entries.iter().enumerate() {
            if let Some(&other_row) = seen.get(&entry.target_term) {
                let other = &entries[other_row - 1];
                if other.target_term == entry.source_term {
                    return Err(ConfigError::CircularTerm {
                        row: (i + 1).max(other_row),
                        term: entry.source_term.clone(),
                    });
                }
            }
        }

        Ok(Self::build(entries))
    }

    /// 按翻译方向加载（术语表以“中文 → 英文”存放）
    ///
    /// 反向使用时，多个中文术语可能对应同一个英文术语，
    /// 此时保留术语表中靠前的一条
    pub fn load_for(
        entries: Vec<TerminologyEntry>,
        pair: LanguagePair,
    ) -> Result<Self, ConfigError> {
        if !pair.glossary_reversed() {
            return Self::load(entries.into_iter().map(|e| (e.source_term, e.target_term)));
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().map(TerminologyEntry::reversed) {
            if seen.insert(entry.source_term.trim().to_string()) {
                rows.push((entry.source_term, entry.target_term));
            } else {
                debug!(
                    "反向术语 '{}' 已存在，忽略 → '{}'",
                    entry.source_term, entry.target_term
                );
            }
        }
        Self::load(rows)
    }

    fn build(entries: Vec<TerminologyEntry>) -> Self {
        let mut by_first_char: HashMap<char, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if let Some(first) = entry.source_term.chars().next() {
                by_first_char.entry(first).or_default().push(idx);
            }
        }
        for candidates in by_first_char.values_mut() {
            // 稳定排序：同长度保持术语表顺序
            candidates.sort_by(|&a, &b| {
                let la = entries[a].source_term.chars().count();
                let lb = entries[b].source_term.chars().count();
                lb.cmp(&la)
            });
        }

        let version = Self::compute_version(&entries);

        Self {
            entries,
            by_first_char,
            version,
        }
    }

    /// 术语表版本：与条目顺序无关的哈希
    fn compute_version(entries: &[TerminologyEntry]) -> String {
        let mut sorted: Vec<&TerminologyEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.source_term.cmp(&b.source_term));

        let mut hasher = blake3::Hasher::new();
        for entry in sorted {
            hasher.update(entry.source_term.as_bytes());
            hasher.update(&[0x1f]);
            hasher.update(entry.target_term.as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.finalize().to_hex()[..16].to_string()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TerminologyEntry] {
        &self.entries
    }

    /// 替换文本中的术语
    pub fn apply(&self, text: &str) -> Substitution {
        if self.entries.is_empty() {
            return Substitution {
                text: text.to_string(),
                applied: Vec::new(),
            };
        }

        let mut out = String::with_capacity(text.len());
        let mut applied: Vec<AppliedTerm> = Vec::new();
        let mut positions: HashMap<usize, usize> = HashMap::new();
        let mut pos = 0;

        while let Some(ch) = text[pos..].chars().next() {
            let matched = self.by_first_char.get(&ch).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|&idx| self.matches_at(text, pos, &self.entries[idx].source_term))
            });

            match matched {
                Some(idx) => {
                    let entry = &self.entries[idx];
                    out.push_str(&entry.target_term);
                    pos += entry.source_term.len();

                    match positions.get(&idx) {
                        Some(&slot) => applied[slot].occurrences += 1,
                        None => {
                            positions.insert(idx, applied.len());
                            applied.push(AppliedTerm {
                                source_term: entry.source_term.clone(),
                                target_term: entry.target_term.clone(),
                                occurrences: 1,
                            });
                        }
                    }
                }
                None => {
                    out.push(ch);
                    pos += ch.len_utf8();
                }
            }
        }

        Substitution { text: out, applied }
    }

    fn matches_at(&self, text: &str, pos: usize, term: &str) -> bool {
        if !text[pos..].starts_with(term) {
            return false;
        }

        let needs_left = term.chars().next().is_some_and(is_word_char);
        let needs_right = term.chars().next_back().is_some_and(is_word_char);

        if needs_left && text[..pos].chars().next_back().is_some_and(is_word_char) {
            return false;
        }
        if needs_right
            && text[pos + term.len()..]
                .chars()
                .next()
                .is_some_and(is_word_char)
        {
            return false;
        }
        true
    }
}

impl Default for TerminologyIndex {
    fn default() -> Self {
        Self::empty()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// 替换后的文本是否已经不含源语言文字
///
/// 只对中文源文本生效：没有汉字即可直接作为译文，不必调用接口
pub fn is_fully_substituted(text: &str, source: Language) -> bool {
    match source {
        Language::Zh => !text.trim().is_empty() && !HAN_PATTERN.is_match(text),
        Language::En => false,
    }
}
