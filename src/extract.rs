//! Text extraction for text-bearing office formats.
//!
//! Extraction sits at the edge of the pipeline: the scanner hands over a
//! path, its lowercase extension and raw bytes, and gets plain text back.
//! Unrecognized extensions produce empty text. A recognized document that
//! fails to parse is an error and stops the run.

use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{DedupError, DedupResult};

/// Upper bound on decompressed bytes read from a single OOXML part.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, ext: &str, bytes: &[u8]) -> DedupResult<String>;
}

/// Handles `txt`, `docx`, `pptx` and `pdf`. Outlook `msg` files are
/// recognized but have no parser, so they contribute empty text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl TextExtractor for DefaultExtractor {
    fn extract(&self, path: &Path, ext: &str, bytes: &[u8]) -> DedupResult<String> {
        let fail = |reason: String| DedupError::Extraction {
            path: path.to_path_buf(),
            reason,
        };
        let text = match ext {
            "txt" => String::from_utf8_lossy(bytes).into_owned(),
            "docx" => extract_docx(bytes).map_err(fail)?,
            "pptx" => extract_pptx(bytes).map_err(fail)?,
            "pdf" => pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| fail(e.to_string()))?,
            "msg" => {
                warn!("No text parser for mail message {}", path.display());
                String::new()
            }
            _ => String::new(),
        };
        debug!("Extracted {} chars from {}", text.len(), path.display());
        Ok(text)
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, String> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, String> {
    let entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!("{} exceeds size limit ({} bytes)", name, MAX_XML_ENTRY_BYTES));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry_bounded(&mut archive, "word/document.xml")?;
    collect_text_runs(&xml, "\n")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = String::new();
    for name in slide_names {
        let xml = read_entry_bounded(&mut archive, &name)?;
        let text = collect_text_runs(&xml, " ")?;
        if !text.is_empty() {
            out.push_str(&text);
            out.push('\n');
        }
    }
    Ok(out)
}

/// Concatenates the contents of every `<*:t>` element. Paragraph ends
/// (`<*:p>` closing tags) are replaced by `paragraph_sep`.
fn collect_text_runs(xml: &[u8], paragraph_sep: &str) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !out.is_empty() && !out.ends_with(paragraph_sep) {
                        out.push_str(paragraph_sep);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}
