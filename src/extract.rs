//! Local PDF text extraction.
//!
//! The client core only needs "text for this path", so extraction sits
//! behind the [`TextExtractor`] trait and the pipeline never touches
//! pdfium directly. Tests substitute an in-memory extractor.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and does CPU-heavy work. Extraction runs on tokio's blocking pool
//! so async worker threads never stall behind a large document.
//!
//! The file is validated (exists, readable, `%PDF` magic) *before* pdfium
//! is bound, so a wrong path gives a precise error even on machines with
//! no pdfium library installed.

use crate::context::CallContext;
use crate::error::ExtractError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Produces the plain text of a document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, ctx: &CallContext, path: &Path) -> Result<String, ExtractError>;
}

/// [`TextExtractor`] for PDF files, backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor {
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// User password for encrypted documents.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Explicit pdfium library location (file or directory).
    ///
    /// Overrides `PDFIUM_LIB_PATH`; without either, the system library
    /// search path is used.
    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, ctx: &CallContext, path: &Path) -> Result<String, ExtractError> {
        if let Some(reason) = ctx.err() {
            return Err(ExtractError::Cancelled(reason));
        }
        validate_pdf_path(path)?;

        let path = path.to_path_buf();
        let password = self.password.clone();
        let library = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

        let text = tokio::task::spawn_blocking(move || {
            extract_blocking(&path, password.as_deref(), library.as_deref())
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {e}")))??;

        if let Some(reason) = ctx.err() {
            return Err(ExtractError::Cancelled(reason));
        }
        Ok(text)
    }
}

/// Check existence, read permission and the `%PDF` magic bytes.
pub fn validate_pdf_path(path: &Path) -> Result<(), ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => return Err(ExtractError::Internal(format!("reading header: {e}"))),
        }
    }
    if &magic != b"%PDF" {
        return Err(ExtractError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let bindings = match library {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

fn extract_blocking(
    path: &Path,
    password: Option<&str>,
    library: Option<&Path>,
) -> Result<String, ExtractError> {
    let pdfium = bind_pdfium(library)?;

    let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            ExtractError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page.text().map_err(|e| ExtractError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("page {}: {e:?}", idx + 1),
        })?;
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&page_text.all());
    }

    info!(
        pages = pages.len(),
        chars = text.chars().count(),
        "Extracted text from {}",
        path.display()
    );
    Ok(text)
}
