//! Table extraction: read the text layer of selected pages via pdfium.
//!
//! pdfium is a C++ library with thread-local state, so every call here runs
//! inside `tokio::task::spawn_blocking`. Each page becomes one [`RawTable`];
//! grouping spans into rows and cells is left to [`super::layout`].

use super::layout::{spans_to_rows, RawTable, TextSpan};
use crate::config::LayoutConfig;
use crate::error::CleanError;
use crate::output::DocumentMetadata;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to pdfium: `PDFIUM_LIB_PATH` when set, otherwise the system library.
pub fn bind_pdfium() -> Result<Pdfium, CleanError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(&p);
            Pdfium::bind_to_library(&path)
                .map_err(|e| CleanError::PdfiumBindingFailed(format!("{}: {e}", path.display())))?
        }
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| CleanError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Extract one raw cell matrix per selected page.
///
/// `page_indices` are 0-based; the returned tables carry 1-indexed page numbers.
pub async fn extract_tables(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
    layout: LayoutConfig,
) -> Result<Vec<RawTable>, CleanError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        extract_tables_blocking(&path, password.as_deref(), &indices, &layout)
    })
    .await
    .map_err(|e| CleanError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, CleanError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                CleanError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                CleanError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            CleanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn extract_tables_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
    layout: &LayoutConfig,
) -> Result<Vec<RawTable>, CleanError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut tables = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        let failed = |e: PdfiumError| CleanError::TextExtractionFailed {
            page: idx + 1,
            detail: format!("{:?}", e),
        };

        let page = pages.get(idx as u16).map_err(failed)?;
        let text = page.text().map_err(failed)?;

        let spans: Vec<TextSpan> = text
            .segments()
            .iter()
            .map(|segment| {
                let b = segment.bounds();
                TextSpan::new(
                    b.left().value,
                    b.right().value,
                    b.top().value,
                    b.bottom().value,
                    segment.text(),
                )
            })
            .collect();

        let rows = spans_to_rows(&spans, layout);
        debug!(
            "Page {}: {} spans → {} rows",
            idx + 1,
            spans.len(),
            rows.len()
        );
        tables.push(RawTable::new(idx + 1, rows));
    }

    Ok(tables)
}

/// Extract document metadata without reading any text.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, CleanError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| CleanError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, CleanError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
