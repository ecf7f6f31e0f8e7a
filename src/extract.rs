//! Best-effort file-to-text extraction for the input buffer.
//!
//! This is an input-preparation convenience, not a parser: word documents
//! get a lossy text pass, textual files are read as-is, and anything else
//! degrades to a truncated base64 preview. Extraction failure never blocks
//! the workflow.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::Read;
use std::path::Path;
use tracing::warn;
use zip::ZipArchive;

pub const EXTRACTION_FAILED: &str = "[Could not extract text from file]";

const BASE64_PREVIEW_LEN: usize = 100;

/// Extensions treated as textual content, the CLI stand-in for a declared
/// "text/*" media type.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "tsv", "log", "json", "xml", "yaml", "yml", "toml", "html", "htm",
];

/// How a file will be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    WordDocument,
    Text,
    Binary,
}

/// Classify by file name, branching on the extension.
pub fn classify(name: &str) -> FileKind {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("docx") => FileKind::WordDocument,
        Some(e) if TEXT_EXTENSIONS.contains(&e) => FileKind::Text,
        _ => FileKind::Binary,
    }
}

/// Pluggable word-document text extraction so tests can stub it.
pub trait DocumentExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Extractor for .docx packages: reads the document XML parts out of the
/// zip container and strips markup.
pub struct DocxExtractor;

impl DocumentExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let mut archive = ZipArchive::new(std::io::Cursor::new(bytes))
            .context("failed to open document package")?;

        let names: Vec<String> = (0..archive.len())
            .filter_map(|i| archive.by_index(i).ok().map(|e| e.name().to_string()))
            .collect();
        let mut targets: Vec<String> = names
            .into_iter()
            .filter(|n| {
                n == "word/document.xml" || n.starts_with("word/header") || n.starts_with("word/footer")
            })
            .collect();
        targets.sort();
        anyhow::ensure!(!targets.is_empty(), "no readable document parts found");

        let mut chunks = Vec::new();
        for name in targets {
            let mut entry = archive
                .by_name(&name)
                .with_context(|| format!("failed to open entry {name}"))?;
            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .with_context(|| format!("failed to read entry {name}"))?;
            let text = xml_to_text(&xml);
            if !text.is_empty() {
                chunks.push(text);
            }
        }
        Ok(chunks.join("\n\n"))
    }
}

/// Lossy markup removal: paragraph and break tags become newlines, all
/// other tags are dropped, entities are decoded.
fn xml_to_text(xml: &str) -> String {
    let with_breaks = xml
        .replace("</w:p>", "\n")
        .replace("<w:tab/>", "\t")
        .replace("<w:br/>", "\n");

    let mut result = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for ch in with_breaks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    let decoded = result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");
    decoded
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text extracted from one file, plus its display name for UI feedback.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub display_name: String,
    pub text: String,
}

/// Turn raw file content into input-buffer text.
///
/// Word-document parse failures are recovered here with a placeholder
/// marker; they are never raised to the caller.
pub fn extract_content(name: &str, bytes: &[u8], extractor: &dyn DocumentExtractor) -> String {
    match classify(name) {
        FileKind::WordDocument => match extractor.extract(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = name, error = %e, "word document extraction failed");
                EXTRACTION_FAILED.to_string()
            }
        },
        FileKind::Text => String::from_utf8_lossy(bytes).into_owned(),
        FileKind::Binary => {
            let encoded = BASE64.encode(bytes);
            let preview: String = encoded.chars().take(BASE64_PREVIEW_LEN).collect();
            format!("[File Uploaded: {name}, Base64: {preview}...]")
        }
    }
}

/// Read a local file and extract text for the input buffer. I/O errors
/// propagate; extraction errors do not.
pub fn extract_file(path: &Path, extractor: &dyn DocumentExtractor) -> Result<ExtractedFile> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    let display_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    let text = extract_content(&display_name, &bytes, extractor);
    Ok(ExtractedFile { display_name, text })
}

/// Append extracted text to the input buffer, separated by a blank line.
/// Always appends, never replaces.
pub fn append_to_buffer(buffer: &mut String, text: &str) {
    if !buffer.is_empty() {
        buffer.push_str("\n\n");
    }
    buffer.push_str(text);
}
