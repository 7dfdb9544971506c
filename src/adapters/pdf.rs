//! PDF text layer and page rasterization through pdfium.

use crate::domain::ports::PdfRenderer;
use crate::utils::error::{Result, SicilError};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks for libpdfium in `dir` before the working directory and system paths.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    fn create_pdfium(&self) -> Result<Pdfium> {
        let configured = self
            .library_dir
            .as_ref()
            .map(|dir| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)));

        let bindings = match configured {
            Some(Ok(bindings)) => Ok(bindings),
            _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| SicilError::Pdf {
            message: format!("Failed to load the pdfium library: {:?}", e),
        })?;

        Ok(Pdfium::new(bindings))
    }
}

fn pdf_error(e: PdfiumError) -> SicilError {
    SicilError::Pdf {
        message: format!("{:?}", e),
    }
}

impl PdfRenderer for PdfiumRenderer {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>> {
        let pdfium = self.create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(pdf_error)?;

        let mut texts = Vec::new();
        for page in document.pages().iter() {
            texts.push(page.text().map_err(pdf_error)?.all());
        }
        Ok(texts)
    }

    fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>> {
        let pdfium = self.create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(pdf_error)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&config).map_err(pdf_error)?;
            let width = bitmap.width() as u32;
            let height = bitmap.height() as u32;

            let raster = image::RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
                .ok_or_else(|| SicilError::Pdf {
                    message: format!("Page {} produced an incomplete bitmap", index + 1),
                })?;

            let mut png = Vec::new();
            image::DynamicImage::ImageRgba8(raster)
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
            tracing::debug!("Rendered page {} ({}x{}, {} bytes)", index + 1, width, height, png.len());
            pages.push(png);
        }
        Ok(pages)
    }
}
