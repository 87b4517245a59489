//! Mock implementations for testing
//!
//! A scripted generative backend that records every request, an in-memory file store
//! with injectable I/O failures, and a metrics sink that keeps every event.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::observability::metrics::{MetricEvent, MetricsSink};
use crate::storage::{
    check_content_size, sanitize_filename, FileStore, FileStoreError, SavedFile, StoredFile,
    DEFAULT_MAX_FILE_SIZE,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock generative backend
///
/// Replies are consumed in order and cycle once exhausted. An empty script answers
/// "Mock response" to everything.
#[derive(Debug, Clone)]
pub struct MockLlmProvider {
    script: Vec<Result<String, LlmError>>,
    current: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Mixed script of replies and failures
    pub fn scripted(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script,
            current: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Every call fails the way a non-2xx backend reply does
    pub fn with_failure() -> Self {
        Self::with_error(LlmError::ApiError(
            "503 Service Unavailable - Mock backend failure".to_string(),
        ))
    }

    pub fn with_error(error: LlmError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut current = self.current.lock().await;
        let step = if self.script.is_empty() {
            Ok("Mock response".to_string())
        } else {
            self.script[*current % self.script.len()].clone()
        };
        *current += 1;

        let content = step?;
        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        match self.script.first() {
            Some(Err(e)) if self.script.len() == 1 => Err(e.clone()),
            _ => Ok(()),
        }
    }
}

/// In-memory file store
///
/// Clones share the same files, so a test can keep a handle after passing one to the
/// coordinator.
#[derive(Debug, Clone)]
pub struct MemoryFileStore {
    files: Arc<StdMutex<BTreeMap<String, String>>>,
    io_failure: Arc<StdMutex<Option<String>>>,
    max_file_size: usize,
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_size(max_file_size: usize) -> Self {
        Self {
            files: Arc::new(StdMutex::new(BTreeMap::new())),
            io_failure: Arc::new(StdMutex::new(None)),
            max_file_size,
        }
    }

    /// Seed a file without going through validation
    pub fn insert(&self, name: &str, content: &str) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.to_string(), content.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(name))
            .unwrap_or(false)
    }

    /// Make every subsequent operation fail with an I/O error
    pub fn fail_io(&self, message: &str) {
        if let Ok(mut failure) = self.io_failure.lock() {
            *failure = Some(message.to_string());
        }
    }

    fn check_io(&self) -> Result<(), FileStoreError> {
        match self.io_failure.lock() {
            Ok(failure) => match failure.as_ref() {
                Some(message) => Err(FileStoreError::Io(message.clone())),
                None => Ok(()),
            },
            Err(_) => Err(FileStoreError::Io("store lock poisoned".to_string())),
        }
    }

    fn files(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, FileStoreError> {
        self.files
            .lock()
            .map_err(|_| FileStoreError::Io("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save(&self, name: &str, content: &str) -> Result<SavedFile, FileStoreError> {
        self.check_io()?;
        check_content_size(content.len(), self.max_file_size)?;
        let clean = sanitize_filename(name)?;
        self.files()?.insert(clean.clone(), content.to_string());
        Ok(SavedFile {
            path: format!("memory://{clean}"),
            name: clean,
            size: content.len(),
        })
    }

    async fn read(&self, name: &str) -> Result<String, FileStoreError> {
        self.check_io()?;
        let clean = sanitize_filename(name)?;
        self.files()?
            .get(&clean)
            .cloned()
            .ok_or(FileStoreError::NotFound(clean))
    }

    async fn list(&self) -> Result<Vec<StoredFile>, FileStoreError> {
        self.check_io()?;
        Ok(self
            .files()?
            .iter()
            .map(|(name, content)| StoredFile {
                name: name.clone(),
                size: content.len() as u64,
                modified: None,
            })
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<(), FileStoreError> {
        self.check_io()?;
        let clean = sanitize_filename(name)?;
        self.files()?
            .remove(&clean)
            .map(|_| ())
            .ok_or(FileStoreError::NotFound(clean))
    }
}

/// Metrics sink that keeps every event in arrival order
#[derive(Debug, Clone, Default)]
pub struct RecordingMetrics {
    events: Arc<StdMutex<Vec<MetricEvent>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl MetricsSink for RecordingMetrics {
    fn record(&self, event: MetricEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
