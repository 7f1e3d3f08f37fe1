//! PDF research summarizer: extract, chunk, summarize, reduce, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use strandex_core::{
    run_blocking, Agent, Document, DocumentExtractor, Error, RunContext, Summarizer,
    SummarizerConfig, ToolRegistry,
};

use crate::config::AgentConfig;
use crate::metadata::resolve_metadata;
use crate::paths::expand_path;
use crate::report::write_report;

pub const NAME: &str = "research_summarizer";

const DESCRIPTION: &str = "Summarize a research PDF into a single Markdown analysis";

/// Tool used when the agent config names none.
pub const DEFAULT_EXTRACTOR: &str = "pdf_reader";

pub struct ResearchSummarizerAgent {
    config: AgentConfig,
    extractor: Arc<dyn DocumentExtractor>,
    summarizer: Summarizer,
}

impl ResearchSummarizerAgent {
    /// Build the agent, resolving its extractor from `tools`.
    ///
    /// The first configured tool is the extractor; every configured tool
    /// must be registered.
    pub fn new(config: AgentConfig, tools: &ToolRegistry) -> Result<Self, Error> {
        for name in &config.tools {
            tools.get(name)?;
        }
        let tool_name = config
            .tools
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_EXTRACTOR);
        let extractor = tools.get(tool_name)?;

        Ok(Self::with_extractor(config, extractor))
    }

    pub fn with_extractor(config: AgentConfig, extractor: Arc<dyn DocumentExtractor>) -> Self {
        let summarizer = Summarizer::new(config.templates());
        Self {
            config,
            extractor,
            summarizer,
        }
    }

    pub fn with_summarizer_config(mut self, config: SummarizerConfig) -> Self {
        self.summarizer = self.summarizer.with_config(config);
        self
    }

    pub fn extractor_name(&self) -> &str {
        self.extractor.name()
    }

    async fn extract(&self, path: &Path) -> Result<Document, Error> {
        let extractor = Arc::clone(&self.extractor);
        let path = path.to_path_buf();
        run_blocking(move || extractor.extract(&path)).await?
    }

    async fn summarize(&self, document: &Document, ctx: &RunContext) -> Result<String, Error> {
        ctx.observer.backend_loading();
        let provider = ctx.backend.load().await?;
        ctx.observer.backend_ready();
        debug!(backend = provider.name(), "Backend ready");

        self.summarizer
            .summarize(
                &document.full_text,
                provider.as_ref(),
                ctx.observer.as_ref(),
                ctx.stream,
            )
            .await
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[async_trait]
impl Agent for ResearchSummarizerAgent {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        if self.config.description.is_empty() {
            DESCRIPTION
        } else {
            self.config.description.as_str()
        }
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> Result<String, Error> {
        let path: PathBuf = expand_path(input.trim());

        if !path.exists() {
            return Ok(format!("PDF not found: {}", path.display()));
        }
        if !has_pdf_extension(&path) {
            return Ok("Input must be a .pdf file path.".to_string());
        }

        let document = match self.extract(&path).await {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "PDF extraction failed");
                return Ok(format!("Failed to read PDF {}: {}", path.display(), e));
            }
        };
        if document.full_text.trim().is_empty() {
            return Ok("No extractable text found in the PDF.".to_string());
        }

        let metadata = resolve_metadata(&document);
        info!(
            path = %path.display(),
            chars = document.full_text.chars().count(),
            title = %metadata.title,
            author = %metadata.author,
            "Summarizing PDF"
        );

        let result = self.summarize(&document, ctx).await;
        ctx.observer.finished();
        let summary = result?;

        if ctx.report {
            let dir = ctx.output_dir.clone();
            let body = summary.clone();
            let report = run_blocking(move || write_report(&dir, &metadata, &body)).await??;
            info!(path = %report.display(), "Report written");
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use strandex_core::testing::{MockBackendLoader, MockProvider};
    use strandex_core::{DocumentMetadata, PipelineObserver};

    struct FakeExtractor {
        text: String,
        metadata: DocumentMetadata,
        calls: AtomicUsize,
    }

    impl FakeExtractor {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                metadata: DocumentMetadata::default(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_title(mut self, title: &str) -> Self {
            self.metadata.title = title.to_string();
            self
        }
    }

    impl DocumentExtractor for FakeExtractor {
        fn name(&self) -> &str {
            "fake_reader"
        }

        fn description(&self) -> &str {
            "Returns canned text"
        }

        fn extract(&self, path: &Path) -> Result<Document, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Document::new(path, self.text.clone()).with_metadata(self.metadata.clone()))
        }
    }

    struct FailingExtractor;

    impl DocumentExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "failing_reader"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn extract(&self, _path: &Path) -> Result<Document, Error> {
            Err(Error::extraction("corrupt xref table"))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn backend_loading(&self) {
            self.events.lock().unwrap().push("loading".into());
        }

        fn backend_ready(&self) {
            self.events.lock().unwrap().push("ready".into());
        }

        fn finished(&self) {
            self.events.lock().unwrap().push("finished".into());
        }
    }

    fn agent(extractor: Arc<dyn DocumentExtractor>) -> ResearchSummarizerAgent {
        ResearchSummarizerAgent::with_extractor(AgentConfig::default(), extractor)
    }

    fn write_pdf(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "%PDF-1.4").unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_file_reports_not_found() {
        let extractor = Arc::new(FakeExtractor::new("text"));
        let loader = Arc::new(MockBackendLoader::new(Arc::new(MockProvider::new())));
        let ctx = RunContext::new(loader.clone());

        let result = agent(extractor.clone()).run("notfound.pdf", &ctx).await.unwrap();

        assert!(result.contains("not found"));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "plain text").unwrap();

        let extractor = Arc::new(FakeExtractor::new("text"));
        let loader = Arc::new(MockBackendLoader::new(Arc::new(MockProvider::new())));
        let ctx = RunContext::new(loader.clone());

        let result = agent(extractor.clone())
            .run(path.to_str().unwrap(), &ctx)
            .await
            .unwrap();

        assert!(result.contains(".pdf"));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_uppercase_extension_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "PAPER.PDF");
        let extractor = Arc::new(FakeExtractor::new("   "));
        let loader = Arc::new(MockBackendLoader::new(Arc::new(MockProvider::new())));
        let ctx = RunContext::new(loader.clone());

        let result = agent(extractor.clone())
            .run(path.to_str().unwrap(), &ctx)
            .await
            .unwrap();

        assert_eq!(result, "No extractable text found in the PDF.");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_reported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "broken.pdf");
        let loader = Arc::new(MockBackendLoader::new(Arc::new(MockProvider::new())));
        let ctx = RunContext::new(loader.clone());

        let result = agent(Arc::new(FailingExtractor))
            .run(path.to_str().unwrap(), &ctx)
            .await
            .unwrap();

        assert!(result.starts_with("Failed to read PDF"));
        assert!(result.contains("corrupt xref table"));
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_full_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "paper.pdf");
        let text = "x".repeat(9000);
        let extractor =
            Arc::new(FakeExtractor::new(&text).with_title("Deep  Learning: A Survey!!"));

        let provider = Arc::new(MockProvider::new());
        provider.queue_response("first");
        provider.queue_response("second");
        provider.queue_response("third");
        provider.queue_response("  Final analysis.  ");
        let loader = Arc::new(MockBackendLoader::new(provider.clone()));
        let observer = Arc::new(RecordingObserver::default());
        let ctx = RunContext::new(loader.clone())
            .with_observer(observer.clone())
            .with_output_dir(dir.path());

        let result = agent(extractor).run(path.to_str().unwrap(), &ctx).await.unwrap();

        assert_eq!(result, "Final analysis.");
        assert_eq!(provider.request_count(), 4);
        assert_eq!(loader.load_count(), 1);
        let last = provider.last_request().unwrap();
        assert!(last.prompt.contains("first\nsecond\nthird"));
        assert_eq!(
            *observer.events.lock().unwrap(),
            vec!["loading", "ready", "finished"]
        );

        let report = dir.path().join("output-deep-learning-a-survey.md");
        let content = std::fs::read_to_string(report).unwrap();
        assert!(content.starts_with("# Deep  Learning: A Survey!!\n"));
        assert!(content.contains("**Author:** Unknown"));
        assert!(content.ends_with("## Analysis\n\nFinal analysis.\n"));
    }

    #[tokio::test]
    async fn test_report_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "paper.pdf");
        let extractor = Arc::new(FakeExtractor::new("A Short Paper Title\nbody text"));

        let provider = Arc::new(MockProvider::new());
        provider.queue_response("chunk notes");
        provider.queue_response("Summary.");
        let loader = Arc::new(MockBackendLoader::new(provider.clone()));
        let ctx = RunContext::new(loader)
            .with_output_dir(dir.path())
            .with_report(false);

        let result = agent(extractor).run(path.to_str().unwrap(), &ctx).await.unwrap();

        assert_eq!(result, "Summary.");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "paper.pdf");
        let extractor = Arc::new(FakeExtractor::new("some text worth summarizing"));
        let loader = Arc::new(MockBackendLoader::failing("model path not set"));
        let observer = Arc::new(RecordingObserver::default());
        let ctx = RunContext::new(loader)
            .with_observer(observer.clone())
            .with_output_dir(dir.path());

        let err = agent(extractor)
            .run(path.to_str().unwrap(), &ctx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("model path not set"));
        assert_eq!(*observer.events.lock().unwrap(), vec!["loading", "finished"]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_new_resolves_default_extractor() {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FakeExtractor::new("")));
        let err = ResearchSummarizerAgent::new(AgentConfig::default(), &tools)
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownTool(name) if name == DEFAULT_EXTRACTOR));

        let config = AgentConfig {
            tools: vec!["fake_reader".to_string()],
            ..AgentConfig::default()
        };
        let agent = ResearchSummarizerAgent::new(config, &tools).unwrap();
        assert_eq!(agent.extractor_name(), "fake_reader");
    }

    #[test]
    fn test_description_from_config() {
        let extractor: Arc<dyn DocumentExtractor> = Arc::new(FakeExtractor::new(""));
        assert_eq!(agent(extractor.clone()).description(), DESCRIPTION);

        let config = AgentConfig {
            description: "Custom".to_string(),
            ..AgentConfig::default()
        };
        let agent = ResearchSummarizerAgent::with_extractor(config, extractor);
        assert_eq!(agent.description(), "Custom");
    }
}
