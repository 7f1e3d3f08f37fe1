//! Title/author fallback for documents without usable metadata.
//!
//! Only labels the output; a wrong guess never blocks a run.

use strandex_core::{Document, DocumentMetadata};

/// Number of leading non-blank lines inspected.
const SCAN_LINES: usize = 6;
/// A title candidate must be longer than this many characters.
const MIN_TITLE_CHARS: usize = 5;
/// Comma-separated author guesses longer than this are treated as prose.
const MAX_AUTHOR_GUESS_CHARS: usize = 80;

/// Extractor metadata, with empty fields filled from the text heuristic.
pub fn resolve_metadata(document: &Document) -> DocumentMetadata {
    let mut metadata = document.metadata.clone();
    metadata.title = metadata.title.trim().to_string();
    metadata.author = metadata.author.trim().to_string();

    if metadata.title.is_empty() || metadata.author.is_empty() {
        let guess = guess_metadata(&document.full_text);
        if metadata.title.is_empty() {
            metadata.title = guess.title;
        }
        if metadata.author.is_empty() {
            metadata.author = guess.author;
        }
    }

    metadata
}

/// Guess title and author from the first few non-blank lines of `text`.
pub fn guess_metadata(text: &str) -> DocumentMetadata {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(SCAN_LINES)
        .collect();

    let title = lines
        .iter()
        .find(|l| l.chars().count() > MIN_TITLE_CHARS)
        .map(|l| l.to_string())
        .unwrap_or_default();

    let labeled = lines
        .iter()
        .filter(|l| l.to_lowercase().contains("author"))
        .map(|l| strip_author_label(l))
        .find(|a| !a.is_empty());

    let author = labeled
        .or_else(|| {
            lines
                .iter()
                .find(|l| {
                    **l != title
                        && l.contains(',')
                        && l.chars().count() <= MAX_AUTHOR_GUESS_CHARS
                })
                .map(|l| l.to_string())
        })
        .unwrap_or_default();

    DocumentMetadata { title, author }
}

/// Remove a leading `Author:`, `Authors:` or `Author(s):` label.
fn strip_author_label(line: &str) -> String {
    let lower = line.to_ascii_lowercase();
    for label in ["author(s)", "authors", "author"] {
        if lower.starts_with(label) {
            let rest = line[label.len()..].trim_start();
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            return rest.trim().to_string();
        }
    }
    line.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_labeled_author() {
        let text = "\n\n  Attention Is All You Need \nAuthors: A. Vaswani, N. Shazeer\nAbstract\n";
        let meta = guess_metadata(text);
        assert_eq!(meta.title, "Attention Is All You Need");
        assert_eq!(meta.author, "A. Vaswani, N. Shazeer");
    }

    #[test]
    fn test_author_label_variants() {
        assert_eq!(strip_author_label("Author(s): Jane Doe"), "Jane Doe");
        assert_eq!(strip_author_label("AUTHOR : Jane Doe"), "Jane Doe");
        assert_eq!(strip_author_label("Corresponding author Jane"), "Corresponding author Jane");
    }

    #[test]
    fn test_short_title_lines_skipped() {
        let meta = guess_metadata("arXiv\nv2\nA Much Longer Title\nbody");
        assert_eq!(meta.title, "A Much Longer Title");
    }

    #[test]
    fn test_comma_line_author_guess() {
        let text = "Graph Neural Networks in Practice\nJane Doe, John Roe\nUniversity of Somewhere";
        let meta = guess_metadata(text);
        assert_eq!(meta.author, "Jane Doe, John Roe");
    }

    #[test]
    fn test_only_first_six_lines_scanned() {
        let text = "Title Line Here\n2\n3\n4\n5\n6\nAuthor: Too Late";
        let meta = guess_metadata(text);
        assert_eq!(meta.title, "Title Line Here");
        assert!(meta.author.is_empty());
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(guess_metadata(""), DocumentMetadata::default());
    }

    #[test]
    fn test_extractor_metadata_preferred() {
        let document = Document::new("paper.pdf", "Text Title Line\nAuthor: Text Author")
            .with_metadata(DocumentMetadata {
                title: "Real Title".to_string(),
                author: String::new(),
            });
        let meta = resolve_metadata(&document);
        assert_eq!(meta.title, "Real Title");
        assert_eq!(meta.author, "Text Author");
    }
}
