use crate::error::ParseError;
use crate::models::PageUnit;
use lopdf::Document;
use std::path::Path;

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageUnit>, ParseError>;
}

/// Text extraction with `lopdf`. Pages without text are kept so the page
/// count reflects the whole document.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageUnit>, ParseError> {
        if !path.is_file() {
            return Err(ParseError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )));
        }

        let document = Document::load(path)
            .map_err(|error| ParseError::PdfParse(format!("{}: {error}", path.display())))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ParseError::PdfParse(error.to_string()))?;

            pages.push(PageUnit {
                text,
                page_index: page_no.saturating_sub(1),
            });
        }

        if pages.is_empty() {
            return Err(ParseError::EmptyDocument(path.display().to_string()));
        }

        Ok(pages)
    }
}

pub fn extract_page_units(path: &Path) -> Result<Vec<PageUnit>, ParseError> {
    LopdfExtractor.extract_pages(path)
}
