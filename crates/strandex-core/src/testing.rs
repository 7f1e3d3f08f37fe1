//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::provider::{
    BackendLoader, CompletionRequest, CompletionResponse, FinishReason, Provider, TokenStream,
    Usage,
};

/// A mock provider that returns pre-configured responses.
pub struct MockProvider {
    responses: Mutex<Vec<Result<String, String>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    streams: AtomicUsize,
    pub name: String,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            streams: AtomicUsize::new(0),
            name: "mock".to_string(),
        }
    }

    /// Queue a response to be returned by the next complete() or stream() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(0, Ok(content.to_string()));
    }

    /// Queue a backend failure.
    pub fn queue_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(0, Err(message.to_string()));
    }

    /// Get the number of captured requests (complete and stream).
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the number of stream() calls.
    pub fn stream_count(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    /// All captured requests, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }

    fn next_response(&self, request: CompletionRequest) -> Result<String, Error> {
        self.captured_requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(Error::backend(message)),
            None => Err(Error::Unknown("No mock response queued".to_string())),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let text = self.next_response(request)?;
        Ok(CompletionResponse {
            text,
            usage: Usage::new(0, 0),
            finish_reason: FinishReason::Stop,
        })
    }

    /// Streams the queued response split after every space.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, Error> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        let text = self.next_response(request)?;
        let fragments: Vec<Result<String, Error>> = text
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

/// A backend loader that hands out a shared [`MockProvider`] and counts loads.
pub struct MockBackendLoader {
    pub provider: Arc<MockProvider>,
    loads: AtomicUsize,
    fail_with: Option<String>,
}

impl MockBackendLoader {
    pub fn new(provider: Arc<MockProvider>) -> Self {
        Self {
            provider,
            loads: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    /// A loader whose every load fails, like a missing model path.
    pub fn failing(message: &str) -> Self {
        Self {
            provider: Arc::new(MockProvider::new()),
            loads: AtomicUsize::new(0),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendLoader for MockBackendLoader {
    async fn load(&self) -> Result<Arc<dyn Provider>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(Error::config(message.clone()));
        }
        Ok(self.provider.clone() as Arc<dyn Provider>)
    }
}
