use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::provider::BackendLoader;

/// Receives progress notifications while an agent runs.
///
/// All methods default to no-ops so observers only implement what they show.
pub trait PipelineObserver: Send + Sync {
    /// The backend is about to be constructed.
    fn backend_loading(&self) {}

    /// The backend is ready to serve requests.
    fn backend_ready(&self) {}

    /// Chunk `index` (1-indexed) of `total` is being summarized.
    fn chunk_started(&self, _index: usize, _total: usize) {}

    /// All chunk summaries are done and the reduction call is starting.
    fn reduce_started(&self, _chunks: usize) {}

    /// A streamed fragment of the final summary arrived.
    fn token(&self, _fragment: &str) {}

    /// The pipeline finished (successfully or not).
    fn finished(&self) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Everything an agent needs from its caller for a single run.
#[derive(Clone)]
pub struct RunContext {
    pub backend: Arc<dyn BackendLoader>,
    pub observer: Arc<dyn PipelineObserver>,
    /// Directory that receives report files.
    pub output_dir: PathBuf,
    /// Stream the final summary through the observer.
    pub stream: bool,
    /// Write a Markdown report next to returning the summary.
    pub report: bool,
}

impl RunContext {
    pub fn new(backend: Arc<dyn BackendLoader>) -> Self {
        Self {
            backend,
            observer: Arc::new(NoopObserver),
            output_dir: PathBuf::from("."),
            stream: false,
            report: true,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }
}

/// A named task handler with a uniform `run(input) -> String` contract.
///
/// Expected bad input is reported through the returned string; only backend
/// and other unrecoverable failures come back as `Err`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String, Error>;
}
