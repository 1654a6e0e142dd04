#![allow(dead_code)]

use async_trait::async_trait;
use sheet_translate::{CellTranslationError, Sleeper, TranslationClient, TranslationRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = dyn Fn(&str, usize) -> Result<String, CellTranslationError> + Send + Sync;

/// 可编排的翻译客户端
///
/// - 默认译文为 `EN(<原文>)`
/// - `respond` 按 (请求文本, 该文本第几次调用) 决定结果
/// - `delay` 为指定文本增加真实等待
/// - `hang_on` 的文本永远不返回
pub struct StubClient {
    respond: Box<Responder>,
    delays: HashMap<String, Duration>,
    hang_on: Vec<String>,
    calls: AtomicUsize,
    per_text: Mutex<HashMap<String, usize>>,
    completed: Mutex<Vec<String>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::responding(|text, _| Ok(format!("EN({})", text)))
    }

    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String, CellTranslationError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(f),
            delays: HashMap::new(),
            hang_on: Vec::new(),
            calls: AtomicUsize::new(0),
            per_text: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn delay(mut self, text: &str, duration: Duration) -> Self {
        self.delays.insert(text.to_string(), duration);
        self
    }

    pub fn hang_on(mut self, text: &str) -> Self {
        self.hang_on.push(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.per_text
            .lock()
            .unwrap()
            .get(text)
            .copied()
            .unwrap_or(0)
    }

    /// 请求过的文本（去重，排序）
    pub fn requested(&self) -> Vec<String> {
        let mut texts: Vec<String> = self.per_text.lock().unwrap().keys().cloned().collect();
        texts.sort();
        texts
    }

    /// 按完成先后排列的文本
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationClient for StubClient {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, CellTranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let nth = {
            let mut per_text = self.per_text.lock().unwrap();
            let n = per_text.entry(request.text.clone()).or_insert(0);
            *n += 1;
            *n
        };

        if self.hang_on.contains(&request.text) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(&request.text) {
            tokio::time::sleep(*delay).await;
        }

        let result = (self.respond)(&request.text, nth);
        self.completed.lock().unwrap().push(request.text.clone());
        result
    }
}

/// 只记录等待时间，不真正等待
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
