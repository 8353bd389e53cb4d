use std::io::Read;
use std::path::Path;

use minutes_core::transcript::{transcript_from_document_xml, DocxError, DOCUMENT_PART};

use crate::prelude::*;

/// Pull `word/document.xml` out of a `.docx` archive.
fn read_document_xml(path: &Path) -> std::result::Result<String, DocxError> {
    let file = std::fs::File::open(path).map_err(|e| DocxError::Archive(e.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| DocxError::Archive(e.to_string()))?;

    let mut part = match archive.by_name(DOCUMENT_PART) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Err(DocxError::MissingDocument),
        Err(e) => return Err(DocxError::Archive(e.to_string())),
    };

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| DocxError::Archive(e.to_string()))?;
    Ok(xml)
}

/// Flattened transcript text of a Word document.
pub fn extract_text_from_docx(path: &Path) -> Result<String> {
    read_document_xml(path)
        .and_then(|xml| transcript_from_document_xml(&xml))
        .map_err(|e| Error::Transcript(format!("{}: {e}", path.display())).into())
}

/// Read a local transcript: `.docx` is flattened, anything else is read as
/// UTF-8 text (VTT, TXT).
pub async fn read_transcript(path: &Path) -> Result<String> {
    let is_docx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));

    if is_docx {
        let path = path.to_path_buf();
        return tokio::task::spawn_blocking(move || extract_text_from_docx(&path))
            .await
            .map_err(|e| eyre!("Transcript reader task failed: {e}"))?;
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read transcript '{}': {}", path.display(), e))
}
