//! PDF text and metadata extraction.

use std::path::Path;

use lopdf::{Dictionary, Object};
use tracing::{debug, warn};

use strandex_core::{Document, DocumentExtractor, DocumentMetadata, Error};

/// Extracts page text and `Info` dictionary metadata from PDF files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReaderTool;

impl PdfReaderTool {
    pub fn new() -> Self {
        Self
    }

    /// Read the PDF's title and author. Missing or unreadable metadata
    /// yields empty strings.
    pub fn read_metadata(&self, path: &Path) -> DocumentMetadata {
        match lopdf::Document::load(path) {
            Ok(doc) => metadata_from(&doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read PDF metadata");
                DocumentMetadata::default()
            }
        }
    }
}

impl DocumentExtractor for PdfReaderTool {
    fn name(&self) -> &str {
        "pdf_reader"
    }

    fn description(&self) -> &str {
        "Extract text and title/author metadata from a PDF file"
    }

    fn extract(&self, path: &Path) -> Result<Document, Error> {
        let mut doc = lopdf::Document::load(path).map_err(|e| extraction_error(path, e))?;
        if doc.is_encrypted() {
            doc.decrypt("").map_err(|e| extraction_error(path, e))?;
        }

        let mut text = String::new();
        {
            let mut output = pdf_extract::PlainTextOutput::new(&mut text);
            pdf_extract::output_doc(&doc, &mut output).map_err(|e| extraction_error(path, e))?;
        }
        let text = text.trim().to_string();
        let metadata = metadata_from(&doc);
        debug!(
            path = %path.display(),
            chars = text.chars().count(),
            title = %metadata.title,
            author = %metadata.author,
            "Extracted PDF"
        );

        Ok(Document::new(path, text).with_metadata(metadata))
    }
}

fn extraction_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::extraction(format!("{}: {}", path.display(), err))
}

fn metadata_from(doc: &lopdf::Document) -> DocumentMetadata {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok());

    match info {
        Some(dict) => DocumentMetadata {
            title: info_string(doc, dict, b"Title"),
            author: info_string(doc, dict, b"Author"),
        },
        None => DocumentMetadata::default(),
    }
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn info_string(doc: &lopdf::Document, dict: &Dictionary, key: &[u8]) -> String {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| match obj {
            Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
            _ => None,
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Decode a PDF text string: UTF-16 with byte-order mark, UTF-8, or
/// PDFDocEncoding.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| pdf_doc_char(b)).collect(),
    }
}

/// PDFDocEncoding differs from Latin-1 in 0x18..=0x1F, 0x7F..=0xA0 and 0xAD.
const PDF_DOC_LOW: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
];

const PDF_DOC_HIGH: [char; 32] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
];

fn pdf_doc_char(byte: u8) -> char {
    match byte {
        0x18..=0x1F => PDF_DOC_LOW[usize::from(byte - 0x18)],
        0x7F | 0xAD => char::REPLACEMENT_CHARACTER,
        0x80..=0x9F => PDF_DOC_HIGH[usize::from(byte - 0x80)],
        0xA0 => '\u{20AC}',
        other => char::from(other),
    }
}
