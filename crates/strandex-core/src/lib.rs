//! strandex-core: Core types and traits for strandex
//!
//! This crate provides the building blocks shared by every strandex agent:
//! the backend trait, fixed-window chunking, prompt templates, the
//! chunk-and-reduce summarization pipeline and the tool registry.

pub mod agent;
pub mod blocking;
pub mod chunker;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod template;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{Agent, NoopObserver, PipelineObserver, RunContext};
pub use blocking::run_blocking;
pub use chunker::{chunk_bounds, chunk_text, DEFAULT_CHUNK_SIZE};
pub use error::Error;
pub use pipeline::{
    Summarizer, SummarizerConfig, DEFAULT_CHUNK_PROMPT, DEFAULT_FINAL_PROMPT,
};
pub use provider::{
    BackendLoader, CompletionRequest, CompletionResponse, FinishReason, Provider, SamplingParams,
    TokenStream, Usage,
};
pub use template::{render, PromptTemplates, CHUNK_SUMMARY, FINAL_SUMMARY};
pub use tool::{Document, DocumentExtractor, DocumentMetadata, ToolInfo, ToolRegistry};

pub type Result<T> = std::result::Result<T, Error>;
