//! Transcript text extraction from Word documents
//!
//! Meeting transcripts exported as `.docx` keep either plain paragraphs or
//! a table of `Timestamp | Speaker | Transcript` rows. The shell reads the
//! `word/document.xml` part out of the archive; everything from the XML
//! onwards happens here.

use roxmltree::{Document, Node};
use serde::Serialize;
use thiserror::Error;

/// WordprocessingML main namespace
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Archive member holding the document body
pub const DOCUMENT_PART: &str = "word/document.xml";

const HEADER_TOKENS: [&str; 5] = ["speaker", "timestamp", "time", "transcript", "utterance"];

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("Failed to read DOCX file: {0}")]
    Archive(String),

    #[error("DOCX file has no word/document.xml part")]
    MissingDocument,

    #[error("Malformed document XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Document XML has no body")]
    MissingBody,
}

/// Body-level content of a Word document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocxContent {
    /// Text of each top-level paragraph, in order
    pub paragraphs: Vec<String>,
    /// Top-level tables as rows of cell text
    pub tables: Vec<Vec<Vec<String>>>,
}

fn is_w(node: &Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(W_NS)
}

/// Visible text of a paragraph: runs, tabs and breaks.
fn paragraph_text(paragraph: Node) -> String {
    let mut text = String::new();
    for node in paragraph.descendants() {
        if is_w(&node, "t") {
            text.push_str(node.text().unwrap_or_default());
        } else if is_w(&node, "tab") {
            text.push('\t');
        } else if is_w(&node, "br") || is_w(&node, "cr") {
            text.push('\n');
        }
    }
    text
}

/// Cell text: its paragraphs joined by newlines.
fn cell_text(cell: Node) -> String {
    cell.children()
        .filter(|n| is_w(n, "p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_rows(table: Node) -> Vec<Vec<String>> {
    table
        .children()
        .filter(|n| is_w(n, "tr"))
        .map(|row| {
            row.children()
                .filter(|n| is_w(n, "tc"))
                .map(|cell| cell_text(cell).trim().to_string())
                .collect()
        })
        .collect()
}

/// Parse `word/document.xml` into paragraphs and tables.
pub fn parse_document_xml(xml: &str) -> Result<DocxContent, DocxError> {
    let document = Document::parse(xml)?;
    let body = document
        .root_element()
        .children()
        .find(|n| is_w(n, "body"))
        .ok_or(DocxError::MissingBody)?;

    let mut content = DocxContent::default();
    for node in body.children() {
        if is_w(&node, "p") {
            content.paragraphs.push(paragraph_text(node));
        } else if is_w(&node, "tbl") {
            content.tables.push(table_rows(node));
        }
    }

    Ok(content)
}

fn is_header_row(cells: &[String]) -> bool {
    cells
        .iter()
        .any(|cell| HEADER_TOKENS.contains(&cell.to_lowercase().as_str()))
}

fn row_line(cells: &[String]) -> String {
    match cells {
        [timestamp, speaker, utterance, ..] if timestamp.is_empty() => {
            format!("{speaker}: {utterance}")
        }
        [timestamp, speaker, utterance, ..] => format!("[{timestamp}] {speaker}: {utterance}"),
        [speaker, utterance] => format!("{speaker}: {utterance}"),
        [single] => single.clone(),
        [] => String::new(),
    }
}

/// Flatten document content into transcript lines.
///
/// Paragraphs come first, then every table row. Three-column rows become
/// `[12:34] Alice: text`, two-column rows `Alice: text`. A first row that
/// looks like a header is skipped. Blank lines are dropped.
pub fn flatten_transcript(content: &DocxContent) -> String {
    let mut lines: Vec<String> = content
        .paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    for table in &content.tables {
        for (index, row) in table.iter().enumerate() {
            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            if index == 0 && is_header_row(row) {
                continue;
            }
            lines.push(row_line(row));
        }
    }

    lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse and flatten in one step.
pub fn transcript_from_document_xml(xml: &str) -> Result<String, DocxError> {
    parse_document_xml(xml).map(|content| flatten_transcript(&content))
}
