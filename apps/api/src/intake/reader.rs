//! Document Reader — turns one uploaded file into plain text.
//!
//! Dispatch is a table from normalised MIME type to `DocumentKind`; anything
//! not in the table maps to `Unsupported` and yields an empty string.

use docx_rs::{
    DocumentChild, InsertChild, ParagraphChild, Run, RunChild, TableCellContent, TableChild,
    TableRowChild,
};
use thiserror::Error;
use tracing::debug;

use crate::intake::models::UploadedFile;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("extraction task aborted: {0}")]
    Aborted(String),
}

/// Extraction strategy selected from a declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Unsupported,
}

const KINDS: &[(&str, DocumentKind)] = &[
    (PDF_MIME, DocumentKind::Pdf),
    (DOCX_MIME, DocumentKind::Docx),
    (TEXT_MIME, DocumentKind::PlainText),
];

impl DocumentKind {
    /// Maps a client-declared MIME type to a strategy. Parameters such as
    /// `; charset=utf-8` and letter case are ignored.
    pub fn from_mime(declared: &str) -> Self {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        KINDS
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, kind)| *kind)
            .unwrap_or(DocumentKind::Unsupported)
    }
}

/// Extracts plain text from `file`. Unsupported types return `""`, never an error.
pub fn extract(file: &UploadedFile) -> Result<String, ExtractionError> {
    let kind = DocumentKind::from_mime(&file.declared_type);
    debug!(
        "Extracting '{}' ({} bytes) as {:?}",
        file.original_name,
        file.content.len(),
        kind
    );

    match kind {
        DocumentKind::Pdf => extract_pdf(&file.content),
        DocumentKind::Docx => extract_docx(&file.content),
        DocumentKind::PlainText => Ok(String::from_utf8_lossy(&file.content).into_owned()),
        DocumentKind::Unsupported => Ok(String::new()),
    }
}

/// Runs `extract` on the blocking pool. A panic inside a parser is reported
/// as `ExtractionError::Aborted` rather than tearing down the request task.
pub async fn extract_blocking(file: UploadedFile) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || extract(&file))
        .await
        .map_err(|e| ExtractionError::Aborted(e.to_string()))?
}

fn extract_pdf(data: &[u8]) -> Result<String, ExtractionError> {
    pdf_extract::extract_text_from_mem(data).map_err(|e| ExtractionError::Pdf(e.to_string()))
}

fn extract_docx(data: &[u8]) -> Result<String, ExtractionError> {
    let docx = docx_rs::read_docx(data).map_err(|e| ExtractionError::Docx(e.to_string()))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(&p.children)),
            DocumentChild::Table(table) => {
                for row in &table.rows {
                    #[allow(irrefutable_let_patterns)]
                    let TableChild::TableRow(row) = row else {
                        continue;
                    };
                    for cell in &row.cells {
                        #[allow(irrefutable_let_patterns)]
                        let TableRowChild::TableCell(cell) = cell else {
                            continue;
                        };
                        for content in &cell.children {
                            if let TableCellContent::Paragraph(p) = content {
                                lines.push(paragraph_text(&p.children));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(lines.join("\n"))
}

fn paragraph_text(children: &[ParagraphChild]) -> String {
    let mut text = String::new();
    push_paragraph_children(children, &mut text);
    text
}

/// Walks runs, including those nested in hyperlinks and tracked insertions.
/// Tracked deletions are skipped.
fn push_paragraph_children(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, text),
            ParagraphChild::Hyperlink(link) => push_paragraph_children(&link.children, text),
            ParagraphChild::Insert(insert) => {
                for inserted in &insert.children {
                    if let InsertChild::Run(run) = inserted {
                        push_run(run, text);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_run(run: &Run, text: &mut String) {
    for run_child in &run.children {
        match run_child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}
