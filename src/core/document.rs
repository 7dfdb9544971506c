use crate::config::{OcrSection, PortalConfig};
use crate::core::captcha::CaptchaResolver;
use crate::core::recognition::recognize_exclusive;
use crate::domain::model::{ExtractedDocument, ExtractionMethod};
use crate::domain::ports::{OcrEngine, PdfRenderer, PortalTransport};
use crate::utils::error::{Result, SicilError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::task::JoinError;
use url::Url;

// 依序嘗試 object → embed → iframe，第一個符合的為準
static PDF_LINK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)<object[^>]+data=["']([^"']+\.pdf)["']"#,
        r#"(?i)<embed[^>]+src=["']([^"']+\.pdf)["']"#,
        r#"(?i)<iframe[^>]+src=["']([^"']+\.pdf)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("pdf link regex is hardcoded and valid"))
    .collect()
});

static FORM_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<form\b[^>]*>").expect("form regex is hardcoded and valid"));

static ACTION_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\baction=["']([^"']*)["']"#).expect("action regex is hardcoded and valid"));

/// Returns the first PDF link on a gazette landing page.
pub fn extract_pdf_url(html: &str) -> Option<String> {
    PDF_LINK_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(html))
        .map(|caps| html_escape::decode_html_entities(&caps[1]).into_owned())
}

/// Action of the form carrying `marker`, if it declares one.
fn verification_action(html: &str, marker: &str) -> Option<String> {
    FORM_TAG
        .find_iter(html)
        .filter(|tag| tag.as_str().contains(marker))
        .find_map(|tag| ACTION_ATTR.captures(tag.as_str()))
        .map(|caps| html_escape::decode_html_entities(&caps[1]).trim().to_string())
        .filter(|action| !action.is_empty())
}

/// Downloads gazette PDFs, passing the inline verification CAPTCHA that
/// some documents sit behind.
pub struct DocumentFetcher {
    transport: Arc<dyn PortalTransport>,
    captcha: Arc<CaptchaResolver>,
    verification_marker: String,
}

impl DocumentFetcher {
    pub fn new(
        config: &PortalConfig,
        transport: Arc<dyn PortalTransport>,
        captcha: Arc<CaptchaResolver>,
    ) -> Self {
        Self {
            transport,
            captcha,
            verification_marker: config.portal.verification_marker.clone(),
        }
    }

    pub async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>> {
        let page_url = self.transport.resolve(url)?;
        let mut html = self.landing_page(&page_url).await?;

        if html.contains(&self.verification_marker) {
            self.pass_verification(&page_url, &html).await?;
            html = self.landing_page(&page_url).await?;
            // 驗證只重來一次
            if html.contains(&self.verification_marker) {
                tracing::warn!("Document {} is still behind verification", page_url);
                return Err(SicilError::DocumentVerificationFailed {
                    url: page_url.to_string(),
                });
            }
        }

        let pdf_path = extract_pdf_url(&html).ok_or_else(|| {
            tracing::error!("No PDF link on {}", page_url);
            SicilError::DocumentNotFound {
                url: page_url.to_string(),
            }
        })?;

        let pdf_url = self.transport.resolve(&pdf_path)?;
        tracing::info!("Downloading gazette PDF {}", pdf_url);
        let pdf = self.transport.get_bytes(pdf_url.as_str()).await?;
        if pdf.is_empty() {
            return Err(SicilError::DocumentExtraction {
                message: format!("{} returned an empty document", pdf_url),
            });
        }

        tracing::debug!("PDF size: {} bytes", pdf.len());
        Ok(pdf)
    }

    async fn landing_page(&self, url: &Url) -> Result<String> {
        let html = self.transport.get_text(url.as_str()).await?;
        if self.transport.is_session_expired(&html) {
            tracing::warn!("Session-expired marker on document page {}", url);
            return Err(SicilError::SessionExpired);
        }
        Ok(html)
    }

    async fn pass_verification(&self, page_url: &Url, html: &str) -> Result<()> {
        tracing::info!("Document {} requires a verification CAPTCHA", page_url);

        let challenge = self.captcha.challenge_from_page(html).await;
        if challenge.critical_error {
            return Err(SicilError::CaptchaCriticalFailure {
                message: challenge.message,
            });
        }
        let text = challenge
            .auto_text()
            .ok_or_else(|| SicilError::CaptchaRequiresManualInput {
                message: challenge.message.clone(),
            })?
            .to_string();

        let target = match verification_action(html, &self.verification_marker) {
            Some(action) => page_url.join(&action)?,
            None => page_url.clone(),
        };

        let response = self
            .transport
            .post_multipart(target.as_str(), &[("Captcha", text.as_str())])
            .await?;
        tracing::debug!("Verification answered from {}", response.final_url);
        Ok(())
    }
}

fn blocking_error(e: JoinError) -> SicilError {
    SicilError::DocumentExtraction {
        message: format!("PDF worker task failed: {}", e),
    }
}

/// Turns PDF bytes into text: embedded text layer when the first page has
/// enough of it, page-image OCR otherwise.
pub struct TextExtractor {
    renderer: Arc<dyn PdfRenderer>,
    ocr: Arc<dyn OcrEngine>,
    languages: String,
    scale: f32,
    min_digital_length: usize,
}

impl TextExtractor {
    pub fn new(config: &OcrSection, renderer: Arc<dyn PdfRenderer>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            renderer,
            ocr,
            languages: config.document_languages.clone(),
            scale: config.render_scale,
            min_digital_length: config.min_digital_text_length,
        }
    }

    pub async fn extract(&self, pdf: Vec<u8>) -> Result<ExtractedDocument> {
        let renderer = self.renderer.clone();
        let (pdf, texts) = tokio::task::spawn_blocking(move || {
            let texts = renderer.page_texts(&pdf);
            (pdf, texts)
        })
        .await
        .map_err(blocking_error)?;
        let texts = texts?;

        let first_page = texts.first().ok_or_else(|| SicilError::DocumentExtraction {
            message: "PDF has no pages".to_string(),
        })?;

        // 以原始長度判斷，換行與空白也算
        let first_page_len = first_page.chars().count();
        if first_page_len > self.min_digital_length {
            tracing::info!(
                "Digital text layer found ({} chars on page 1), skipping OCR",
                first_page_len
            );
            return Ok(ExtractedDocument {
                text: texts.join("\n").trim().to_string(),
                method: ExtractionMethod::Digital,
                page_count: texts.len(),
            });
        }

        tracing::info!(
            "Page 1 has {} chars of text, running OCR on {} pages",
            first_page_len,
            texts.len()
        );
        self.ocr_pages(pdf).await
    }

    async fn ocr_pages(&self, pdf: Vec<u8>) -> Result<ExtractedDocument> {
        let renderer = self.renderer.clone();
        let scale = self.scale;
        let pages = tokio::task::spawn_blocking(move || renderer.render_pages(&pdf, scale))
            .await
            .map_err(blocking_error)??;

        let mut text = String::new();
        let mut recognized_any = false;
        for (index, png) in pages.iter().enumerate() {
            let page_text = recognize_exclusive(self.ocr.as_ref(), png, &self.languages).await?;
            tracing::debug!("OCR page {}: {} chars", index + 1, page_text.len());
            recognized_any |= !page_text.trim().is_empty();

            text.push_str(&format!("--- Sayfa {} ---\n", index + 1));
            text.push_str(page_text.trim());
            text.push('\n');
        }

        if !recognized_any {
            return Err(SicilError::DocumentExtraction {
                message: "OCR produced no text".to_string(),
            });
        }

        Ok(ExtractedDocument {
            text: text.trim().to_string(),
            method: ExtractionMethod::Ocr,
            page_count: pages.len(),
        })
    }
}
