//! 翻译客户端
//!
//! 编排层只认识 `TranslationClient` 这个接口：输入一段文本，
//! 返回译文或者“临时 / 永久”两类错误之一，传输细节一律不外泄。
//!
//! `OpenAiTranslator` 使用 `async-openai` 调用兼容 OpenAI API 的服务
//! （OpenAI、Azure、Doubao 等）。

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::CellTranslationError;
use crate::models::LanguagePair;
use crate::services::AppliedTerm;

/// 一次翻译请求
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// 已完成术语替换的文本
    pub text: String,
    pub pair: LanguagePair,
    /// 已替换的术语，提示模型保持原样
    pub glossary_hints: Vec<AppliedTerm>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, pair: LanguagePair) -> Self {
        Self {
            text: text.into(),
            pair,
            glossary_hints: Vec::new(),
        }
    }

    pub fn with_hints(mut self, hints: Vec<AppliedTerm>) -> Self {
        self.glossary_hints = hints;
        self
    }
}

/// 翻译客户端接口
///
/// 每次调用对应一次远程请求，重试由调用方负责
#[async_trait]
pub trait TranslationClient: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, CellTranslationError>;
}

/// 基于 OpenAI 兼容接口的翻译客户端
pub struct OpenAiTranslator {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiTranslator {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }
}

#[async_trait]
impl TranslationClient for OpenAiTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, CellTranslationError> {
        debug!(
            "调用翻译接口，模型: {}，方向: {}，文本长度: {} 字符",
            self.model_name,
            request.pair,
            request.text.chars().count()
        );

        let mut messages = Vec::new();

        if let Some(hint) = build_glossary_hint(&request.glossary_hints) {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(hint)
                .build()
                .map_err(|e| CellTranslationError::permanent(format!("构建请求失败: {}", e)))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(build_prompt(&request.text, request.pair))
            .build()
            .map_err(|e| CellTranslationError::permanent(format!("构建请求失败: {}", e)))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| CellTranslationError::permanent(format!("构建请求失败: {}", e)))?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("翻译接口调用失败: {}", e);
            classify_openai_error(&e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        check_response(&content)
    }
}

/// 用户提示词
pub fn build_prompt(text: &str, pair: LanguagePair) -> String {
    format!(
        "请将以下{}文本翻译成{}，只返回译文，不要解释：\n{}",
        pair.source.display_name(),
        pair.target.display_name(),
        text
    )
}

/// 术语提示（没有命中术语时不发送）
pub fn build_glossary_hint(terms: &[AppliedTerm]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    let list = terms
        .iter()
        .map(|t| format!("- {}", t.target_term))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!(
        "你是专业的翻译。文本中以下术语已按术语表译好，请原样保留，不要改写：\n{}",
        list
    ))
}

/// 检查响应内容
///
/// 空响应和网关返回的 HTML 页面都按临时错误处理
pub fn check_response(content: &str) -> Result<String, CellTranslationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CellTranslationError::transient("接口返回内容为空"));
    }

    let head: String = trimmed.chars().take(15).collect::<String>().to_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Err(CellTranslationError::transient("接口返回了 HTML 页面"));
    }

    Ok(trimmed.to_string())
}

/// 把接口错误归为临时或永久
pub fn classify_openai_error(err: &OpenAIError) -> CellTranslationError {
    match err {
        OpenAIError::Reqwest(e) => {
            if e.is_timeout() || e.is_connect() {
                return CellTranslationError::transient(format!("网络错误: {}", e));
            }
            match e.status().map(|s| s.as_u16()) {
                Some(code) => classify_status(code, &e.to_string()),
                None => CellTranslationError::transient(format!("网络错误: {}", e)),
            }
        }
        OpenAIError::ApiError(_) => classify_api_message(&err.to_string()),
        OpenAIError::InvalidArgument(msg) => CellTranslationError::permanent(msg.clone()),
        other => CellTranslationError::transient(other.to_string()),
    }
}

/// 按 HTTP 状态码分类
pub fn classify_status(code: u16, message: &str) -> CellTranslationError {
    match code {
        408 | 429 | 500..=599 => CellTranslationError::transient(format!("HTTP {}: {}", code, message)),
        400..=499 => CellTranslationError::permanent(format!("HTTP {}: {}", code, message)),
        _ => CellTranslationError::transient(format!("HTTP {}: {}", code, message)),
    }
}

/// 按接口返回的错误信息分类，无法识别的按临时错误处理
pub fn classify_api_message(message: &str) -> CellTranslationError {
    const TRANSIENT: &[&str] = &[
        "rate limit",
        "rate_limit",
        "timeout",
        "timed out",
        "overloaded",
        "server_error",
        "server error",
        "unavailable",
    ];
    const PERMANENT: &[&str] = &[
        "invalid_api_key",
        "incorrect api key",
        "authentication",
        "unauthorized",
        "permission",
        "invalid_request",
        "content_filter",
        "content management policy",
        "model_not_found",
        "context_length_exceeded",
    ];

    let lower = message.to_lowercase();
    if TRANSIENT.iter().any(|k| lower.contains(k)) {
        CellTranslationError::transient(message)
    } else if PERMANENT.iter().any(|k| lower.contains(k)) {
        CellTranslationError::permanent(message)
    } else {
        CellTranslationError::transient(message)
    }
}
