//! Plain-text extraction from word-processor and PDF scripts.
//!
//! A `.docx` yields one line per paragraph. A `.pdf` yields the text of
//! each page followed by a line break.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Main body part of a WordprocessingML package.
const DOCX_BODY: &str = "word/document.xml";

/// Extract paragraph text from `.docx` bytes.
pub(crate) fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SyncError::invalid_script(format!("not a docx package: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| SyncError::invalid_script(format!("docx has no {DOCX_BODY}: {e}")))?
        .read_to_string(&mut xml)?;
    paragraphs_from_xml(&xml).map(|paragraphs| paragraphs.join("\n"))
}

/// Collect the text runs of each `w:p`, in document order.
fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SyncError::invalid_script(format!("malformed docx body: {e}")))?;
        match event {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| SyncError::invalid_script(format!("malformed docx text: {e}")))?;
                current.push_str(&text);
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"w:p" => {
                paragraphs.push(std::mem::take(&mut current));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(paragraphs = paragraphs.len(), "extracted docx paragraphs");
    Ok(paragraphs)
}

/// Extract page text from `.pdf` bytes.
pub(crate) fn pdf_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| SyncError::invalid_script(format!("unreadable pdf: {e}")))?;
    let mut out = String::with_capacity(text.len());
    for page in text.split('\u{c}') {
        let page = page.trim();
        if !page.is_empty() {
            out.push_str(page);
            out.push('\n');
        }
    }
    Ok(out)
}
