//! Agent definitions and registry for strandex.
//!
//! This crate provides:
//! - `AgentConfig`, the lenient per-agent `config.json` loader
//! - The research summarizer agent and its report writer
//! - `AgentRegistry` for listing and instantiating agents by name

mod config;
mod metadata;
mod paths;
mod registry;
mod report;
mod research_summarizer;

pub use config::AgentConfig;
pub use metadata::{guess_metadata, resolve_metadata};
pub use paths::expand_path;
pub use registry::{default_agents_dir, AgentFactory, AgentInfo, AgentRegistry, BuiltinAgent};
pub use report::{render_report, report_filename, slugify, write_report};
pub use research_summarizer::{ResearchSummarizerAgent, DEFAULT_EXTRACTOR};
