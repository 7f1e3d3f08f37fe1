//! strandex-tools: Built-in tools for strandex agents
//!
//! - PDF reader: page text plus title/author metadata

use std::sync::Arc;

use strandex_core::ToolRegistry;

pub mod pdf_reader;

pub use pdf_reader::{decode_pdf_string, PdfReaderTool};

/// Registry holding every built-in tool.
pub fn default_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(PdfReaderTool::new()));
    registry
}
