//! Chunk-and-reduce summarization.
//!
//! A document of any length is:
//! 1. Split into fixed-size character windows
//! 2. Summarized window by window, in order, one backend call each
//! 3. Reduced into a single summary by one more backend call over the
//!    newline-joined chunk summaries
//!
//! The first failing backend call aborts the whole summary.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::PipelineObserver;
use crate::chunker::{chunk_text, DEFAULT_CHUNK_SIZE};
use crate::error::Error;
use crate::provider::{CompletionRequest, Provider, SamplingParams};
use crate::template::{PromptTemplates, CHUNK_SUMMARY, FINAL_SUMMARY};

/// Fallback prompt for summarizing one chunk. Placeholder: `{chunk}`.
pub const DEFAULT_CHUNK_PROMPT: &str = "You are a research assistant. Summarize the following \
text for concise research notes. Focus on key claims, evidence, and conclusions.\n\n\
Text:\n{chunk}\n\nSummary:\n";

/// Fallback prompt for the reduction step. Placeholder: `{notes}`.
pub const DEFAULT_FINAL_PROMPT: &str = "You are a research assistant. Combine the notes into a \
clear summary with 3-6 bullet points plus a short paragraph overview.\n\n\
Notes:\n{notes}\n\nSummary:\n";

/// Stop markers for per-chunk calls.
pub const CHUNK_STOP: [&str; 2] = ["\n\nText:", "\n\nSummary:"];
/// Stop markers for the reduction call.
pub const FINAL_STOP: [&str; 2] = ["\n\nNotes:", "\n\nSummary:"];

/// Window and sampling settings for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Window length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Sampling for each chunk summary.
    #[serde(default = "default_chunk_params")]
    pub chunk_params: SamplingParams,

    /// Sampling for the reduction call.
    #[serde(default = "default_final_params")]
    pub final_params: SamplingParams,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_params() -> SamplingParams {
    SamplingParams::new(400, 0.2).with_stop(CHUNK_STOP)
}

fn default_final_params() -> SamplingParams {
    SamplingParams::new(500, 0.2).with_stop(FINAL_STOP)
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_params: default_chunk_params(),
            final_params: default_final_params(),
        }
    }
}

impl SummarizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window length in characters.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_params(mut self, params: SamplingParams) -> Self {
        self.chunk_params = params;
        self
    }

    pub fn with_final_params(mut self, params: SamplingParams) -> Self {
        self.final_params = params;
        self
    }
}

/// Map-then-reduce summarizer over a single backend.
pub struct Summarizer {
    config: SummarizerConfig,
    templates: PromptTemplates,
}

impl Summarizer {
    pub fn new(templates: PromptTemplates) -> Self {
        Self {
            config: SummarizerConfig::default(),
            templates,
        }
    }

    pub fn with_config(mut self, config: SummarizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize `full_text` into one trimmed summary.
    ///
    /// With `stream` set, the reduction call is consumed as a token stream
    /// and every fragment is forwarded to `observer`.
    pub async fn summarize(
        &self,
        full_text: &str,
        provider: &dyn Provider,
        observer: &dyn PipelineObserver,
        stream: bool,
    ) -> Result<String, Error> {
        let chunks = chunk_text(full_text, self.config.chunk_size)?;
        info!(
            chars = full_text.chars().count(),
            chunks = chunks.len(),
            chunk_size = self.config.chunk_size,
            "Summarizing document"
        );

        if chunks.is_empty() {
            return Ok(String::new());
        }

        let summaries = self.summarize_chunks(&chunks, provider, observer).await?;
        self.reduce(&summaries, provider, observer, stream).await
    }

    /// Summarize each chunk in order, one backend call per chunk.
    pub async fn summarize_chunks(
        &self,
        chunks: &[String],
        provider: &dyn Provider,
        observer: &dyn PipelineObserver,
    ) -> Result<Vec<String>, Error> {
        let total = chunks.len();
        let mut summaries = Vec::with_capacity(total);

        for (i, chunk) in chunks.iter().enumerate() {
            observer.chunk_started(i + 1, total);
            let prompt = self.templates.render(
                CHUNK_SUMMARY,
                DEFAULT_CHUNK_PROMPT,
                &[("chunk", chunk.as_str())],
            )?;
            debug!(chunk = i + 1, total, prompt_len = prompt.len(), "Summarizing chunk");

            let request = CompletionRequest::new(prompt, self.config.chunk_params.clone());
            let response = provider.complete(request).await?;
            debug!(
                chunk = i + 1,
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "Chunk summarized"
            );
            summaries.push(response.text.trim().to_string());
        }

        Ok(summaries)
    }

    /// Fold the chunk summaries into the final summary.
    pub async fn reduce(
        &self,
        summaries: &[String],
        provider: &dyn Provider,
        observer: &dyn PipelineObserver,
        stream: bool,
    ) -> Result<String, Error> {
        observer.reduce_started(summaries.len());
        let notes = summaries.join("\n");
        let prompt = self
            .templates
            .render(FINAL_SUMMARY, DEFAULT_FINAL_PROMPT, &[("notes", notes.as_str())])?;
        let request = CompletionRequest::new(prompt, self.config.final_params.clone());

        if !stream {
            let response = provider.complete(request).await?;
            info!(
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "Final summary generated"
            );
            return Ok(response.text.trim().to_string());
        }

        let mut tokens = provider.stream(request).await?;
        let mut text = String::new();
        while let Some(fragment) = tokens.next().await {
            let fragment = fragment?;
            observer.token(&fragment);
            text.push_str(&fragment);
        }
        info!(chars = text.len(), "Final summary streamed");

        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::agent::NoopObserver;
    use crate::testing::MockProvider;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn chunk_started(&self, index: usize, total: usize) {
            self.events.lock().unwrap().push(format!("chunk {}/{}", index, total));
        }

        fn reduce_started(&self, chunks: usize) {
            self.events.lock().unwrap().push(format!("reduce {}", chunks));
        }

        fn token(&self, fragment: &str) {
            self.events.lock().unwrap().push(format!("token {}", fragment));
        }
    }

    fn document(chars: usize) -> String {
        "abcdefghij".repeat(chars / 10)
    }

    #[tokio::test]
    async fn test_three_chunks_then_reduce() {
        let provider = MockProvider::new();
        provider.queue_response("  one  ");
        provider.queue_response("two");
        provider.queue_response("three");
        provider.queue_response("\n final summary \n");

        let observer = RecordingObserver::default();
        let summarizer = Summarizer::new(PromptTemplates::new());
        let result = summarizer
            .summarize(&document(9000), &provider, &observer, false)
            .await
            .unwrap();

        assert_eq!(result, "final summary");
        assert_eq!(provider.request_count(), 4);

        let requests = provider.requests();
        for request in &requests[..3] {
            assert!(request.prompt.contains("Text:\n"));
            assert_eq!(request.params.max_tokens, 400);
            assert_eq!(request.params.temperature, 0.2);
            assert_eq!(
                request.params.stop.as_deref(),
                Some(&["\n\nText:".to_string(), "\n\nSummary:".to_string()][..])
            );
        }

        let last = &requests[3];
        assert_eq!(last.params.max_tokens, 500);
        assert!(last.prompt.contains("Notes:\none\ntwo\nthree\n\nSummary:\n"));
        assert_eq!(
            last.params.stop.as_deref(),
            Some(&["\n\nNotes:".to_string(), "\n\nSummary:".to_string()][..])
        );

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(events, vec!["chunk 1/3", "chunk 2/3", "chunk 3/3", "reduce 3"]);
    }

    #[tokio::test]
    async fn test_chunks_sent_in_document_order() {
        let text = format!("{}{}", "a".repeat(3000), "b".repeat(10));
        let provider = MockProvider::new();
        provider.queue_response("s1");
        provider.queue_response("s2");
        provider.queue_response("done");

        Summarizer::new(PromptTemplates::new())
            .summarize(&text, &provider, &NoopObserver, false)
            .await
            .unwrap();

        let requests = provider.requests();
        assert!(requests[0].prompt.contains(&"a".repeat(3000)));
        assert!(requests[1].prompt.contains("\nbbbbbbbbbb\n"));
    }

    #[tokio::test]
    async fn test_custom_templates_and_chunk_size() {
        let mut templates = PromptTemplates::new();
        templates.insert(CHUNK_SUMMARY, "C[{chunk}]");
        templates.insert(FINAL_SUMMARY, "F[{notes}]");

        let provider = MockProvider::new();
        provider.queue_response("x");
        provider.queue_response("y");
        provider.queue_response("z");

        let summarizer = Summarizer::new(templates)
            .with_config(SummarizerConfig::new().with_chunk_size(2));
        summarizer
            .summarize("abcd", &provider, &NoopObserver, false)
            .await
            .unwrap();

        let prompts: Vec<String> = provider.requests().into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts, vec!["C[ab]", "C[cd]", "F[x\ny]"]);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts() {
        let provider = MockProvider::new();
        provider.queue_response("first");
        provider.queue_error("model crashed");
        provider.queue_response("never used");

        let result = Summarizer::new(PromptTemplates::new())
            .summarize(&document(9000), &provider, &NoopObserver, false)
            .await;

        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_template_fails_before_backend() {
        let mut templates = PromptTemplates::new();
        templates.insert(CHUNK_SUMMARY, "Text: {text}");

        let provider = MockProvider::new();
        let result = Summarizer::new(templates)
            .summarize("some text", &provider, &NoopObserver, false)
            .await;

        assert!(matches!(result, Err(Error::Template { .. })));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_only_text_makes_no_calls() {
        let provider = MockProvider::new();
        let result = Summarizer::new(PromptTemplates::new())
            .summarize("   \n\t  ", &provider, &NoopObserver, false)
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_streamed_reduction() {
        let provider = MockProvider::new();
        provider.queue_response("note");
        provider.queue_response(" - point one\n - point two ");

        let observer = RecordingObserver::default();
        let result = Summarizer::new(PromptTemplates::new())
            .summarize("short document", &provider, &observer, true)
            .await
            .unwrap();

        assert_eq!(result, "- point one\n - point two");
        let events = observer.events.lock().unwrap().clone();
        assert!(events.iter().filter(|e| e.starts_with("token ")).count() > 1);
        assert_eq!(provider.stream_count(), 1);
    }
}
