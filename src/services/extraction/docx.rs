// DOCX Extraction
// Paragraph text in document order, one paragraph per line.

use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

use docx_rs::{
    DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild, StructuredDataTagChild,
};

use super::{ExtractionError, ExtractionStrategy};

static RUN_TEXT_RE: OnceLock<Regex> = OnceLock::new();

/// Body paragraphs parsed with docx-rs.
pub struct DocxParagraphs;

impl ExtractionStrategy for DocxParagraphs {
    fn name(&self) -> &'static str {
        "docx_paragraphs"
    }

    fn attempt(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| ExtractionError::Failed(format!("docx parse failed: {:?}", e)))?;

        let paragraphs: Vec<String> = docx
            .document
            .children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
                _ => None,
            })
            .collect();

        Ok(paragraphs.join("\n"))
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    push_children(&paragraph.children, &mut out);
    out
}

// Hyperlinks, tracked insertions and content controls nest runs; deletions do not count.
fn push_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, out),
            ParagraphChild::Hyperlink(link) => push_children(&link.children, out),
            ParagraphChild::Insert(insert) => {
                for c in &insert.children {
                    if let InsertChild::Run(run) = c {
                        push_run(run, out);
                    }
                }
            }
            ParagraphChild::StructuredDataTag(tag) => {
                for c in &tag.children {
                    if let StructuredDataTagChild::Run(run) = c {
                        push_run(run, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_run(run: &Run, out: &mut String) {
    for run_child in &run.children {
        match run_child {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push('\t'),
            RunChild::Break(_) | RunChild::CarriageReturn(_) => out.push('\n'),
            _ => {}
        }
    }
}

/// Reads `word/document.xml` straight from the archive. Used when docx-rs
/// rejects a file that still carries readable paragraphs.
pub struct DocxRawXml;

impl ExtractionStrategy for DocxRawXml {
    fn name(&self) -> &'static str {
        "docx_raw_xml"
    }

    fn attempt(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::Failed(format!("not a DOCX archive: {}", e)))?;
        let mut file = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractionError::Failed(format!("word/document.xml missing: {}", e)))?;

        let mut xml = String::new();
        file.read_to_string(&mut xml)
            .map_err(|e| ExtractionError::Failed(format!("word/document.xml unreadable: {}", e)))?;

        Ok(paragraphs_from_xml(&xml).join("\n"))
    }
}

fn paragraphs_from_xml(xml: &str) -> Vec<String> {
    let re = RUN_TEXT_RE.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|(<w:tab\s*/>)|<w:(?:br|cr)(?:\s[^>]*)?/>").unwrap()
    });

    let mut parts: Vec<&str> = xml.split("</w:p>").collect();
    // Anything after the last paragraph close is section properties.
    parts.pop();

    parts
        .into_iter()
        .map(|part| {
            re.captures_iter(part)
                .map(|caps| match (caps.get(1), caps.get(2)) {
                    (Some(text), _) => decode_entities(text.as_str()),
                    (None, Some(_)) => "\t".to_string(),
                    (None, None) => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect()
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
