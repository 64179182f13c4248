//! Document collaborators: text extraction from uploaded resumes and job
//! descriptions, and video transcription.
//!
//! Neither collaborator may fail: extraction falls back to a lossy UTF-8
//! decode of the raw bytes and transcription falls back to an empty string.

pub mod transcribe;

use std::io::{Cursor, Read};
use std::panic;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX archive error: {0}")]
    Docx(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Plain,
}

impl DocumentKind {
    /// Decided by file extension, falling back to the PDF magic bytes.
    pub fn detect(filename: &str, bytes: &[u8]) -> Self {
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") || bytes.starts_with(b"%PDF") {
            DocumentKind::Pdf
        } else if lower.ends_with(".docx") {
            DocumentKind::Docx
        } else {
            DocumentKind::Plain
        }
    }
}

/// Best-effort text of an uploaded document. Never fails.
///
/// CPU-bound; call from `spawn_blocking` on the request path.
pub fn extract_text(filename: &str, bytes: &[u8]) -> String {
    let kind = DocumentKind::detect(filename, bytes);
    match try_extract(kind, bytes) {
        Ok(text) => {
            debug!("Extracted {} chars from {filename} ({kind:?})", text.len());
            text
        }
        Err(e) => {
            warn!("Text extraction failed for {filename}, decoding raw bytes: {e}");
            decode_lossy(bytes)
        }
    }
}

pub fn try_extract(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Plain => Ok(decode_lossy(bytes)),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs.
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

/// Collects `<w:t>` runs, one line per `<w:p>` paragraph.
fn docx_xml_to_text(xml: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        let Some(end) = rest[start..].find('>') else {
            break;
        };
        let tag = &rest[start + 1..start + end];
        rest = &rest[start + end + 1..];

        if tag == "w:t" || tag.starts_with("w:t ") {
            let close = rest.find("</w:t>").unwrap_or(rest.len());
            current.push_str(&unescape_xml(&rest[..close]));
            rest = &rest[close..];
        } else if tag == "w:tab/" {
            current.push('\t');
        } else if tag == "/w:p" {
            paragraphs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
