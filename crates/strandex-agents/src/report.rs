//! Markdown report output.

use std::path::{Path, PathBuf};

use strandex_core::DocumentMetadata;

const MAX_SLUG_CHARS: usize = 80;

/// Filesystem-safe slug: lowercase alphanumerics, with spaces, `-` and `_`
/// collapsed into single hyphens and everything else dropped.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if matches!(c, ' ' | '-' | '_') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let truncated: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    truncated.trim_end_matches('-').to_string()
}

/// `output-<slug>.md`, or `output.md` when the title has no usable characters.
pub fn report_filename(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        "output.md".to_string()
    } else {
        format!("output-{}.md", slug)
    }
}

pub fn render_report(metadata: &DocumentMetadata, summary: &str) -> String {
    let title = if metadata.title.is_empty() {
        "Untitled"
    } else {
        metadata.title.as_str()
    };
    let author = if metadata.author.is_empty() {
        "Unknown"
    } else {
        metadata.author.as_str()
    };

    format!(
        "# {}\n\n**Author:** {}\n\n## Analysis\n\n{}\n",
        title,
        author,
        summary.trim()
    )
}

/// Write the report into `dir` and return its path.
pub fn write_report(
    dir: &Path,
    metadata: &DocumentMetadata,
    summary: &str,
) -> std::io::Result<PathBuf> {
    let path = dir.join(report_filename(&metadata.title));
    std::fs::write(&path, render_report(metadata, summary))?;
    Ok(path)
}
