use crate::config::PortalConfig;
use crate::core::recognition::{recognize_exclusive, to_grayscale_png};
use crate::domain::model::{CaptchaChallenge, CaptchaView};
use crate::domain::ports::{OcrEngine, PortalTransport};
use crate::utils::html::letters_and_digits;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use url::Url;

/// Loads the portal's CAPTCHA image and tries to read it with OCR.
pub struct CaptchaResolver {
    transport: Arc<dyn PortalTransport>,
    ocr: Arc<dyn OcrEngine>,
    patterns: Vec<Regex>,
    languages: String,
    min_length: usize,
    last_image: Mutex<Option<Vec<u8>>>,
}

impl CaptchaResolver {
    pub fn new(
        config: &PortalConfig,
        transport: Arc<dyn PortalTransport>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        let id = regex::escape(&config.portal.captcha_element_id);
        // id 與 src 的先後順序都接受
        let patterns = [
            format!(r#"<img[^>]*?id=['"]{}['"][^>]*?src=['"]([^'"]+?)['"]"#, id),
            format!(r#"<img[^>]*?src=['"]([^'"]+?)['"][^>]*?id=['"]{}['"]"#, id),
        ]
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("captcha pattern is built from an escaped id")
        })
        .collect();

        Self {
            transport,
            ocr,
            patterns,
            languages: config.ocr.captcha_languages.clone(),
            min_length: config.ocr.min_captcha_length,
            last_image: Mutex::new(None),
        }
    }

    /// Fetches the landing page and resolves the login CAPTCHA on it.
    pub async fn load_challenge(&self) -> CaptchaChallenge {
        tracing::info!("Loading CAPTCHA image...");

        let html = match self.transport.get_text("/").await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("CAPTCHA page could not be loaded: {}", e);
                return CaptchaChallenge::critical(format!("CAPTCHA page could not be loaded: {}", e));
            }
        };

        self.challenge_from_page(&html).await
    }

    /// Resolves the CAPTCHA embedded in an already fetched page.
    pub async fn challenge_from_page(&self, html: &str) -> CaptchaChallenge {
        let captcha_url = match self.extract_captcha_url(html) {
            Some(url) => url,
            None => {
                tracing::error!("CAPTCHA element not found on the page");
                return CaptchaChallenge::critical("CAPTCHA image element was not found on the page");
            }
        };

        let image = match self.transport.get_bytes(captcha_url.as_str()).await {
            Ok(image) if !image.is_empty() => image,
            Ok(_) => {
                tracing::error!("CAPTCHA image at {} is empty", captcha_url);
                return CaptchaChallenge::critical("CAPTCHA image was empty");
            }
            Err(e) => {
                tracing::error!("CAPTCHA image download failed: {}", e);
                return CaptchaChallenge::critical(format!("CAPTCHA image could not be downloaded: {}", e));
            }
        };

        *self.last_image.lock() = Some(image.clone());

        match self.recognize(&image).await {
            Some(text) => CaptchaChallenge::resolved(image, text),
            None => CaptchaChallenge::manual(image),
        }
    }

    /// Grayscale, OCR and sanitize; `None` unless at least the minimum
    /// number of letters and digits came back.
    pub async fn recognize(&self, image: &[u8]) -> Option<String> {
        let gray = match to_grayscale_png(image) {
            Ok(gray) => gray,
            Err(e) => {
                tracing::warn!("CAPTCHA image could not be decoded: {}", e);
                return None;
            }
        };

        let raw = match recognize_exclusive(self.ocr.as_ref(), &gray, &self.languages).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("CAPTCHA OCR failed: {}", e);
                return None;
            }
        };

        let text = letters_and_digits(&raw);
        tracing::debug!("CAPTCHA OCR result: '{}'", text);
        self.accept(text)
    }

    fn accept(&self, text: String) -> Option<String> {
        if text.chars().count() >= self.min_length {
            Some(text)
        } else {
            None
        }
    }

    pub fn extract_captcha_url(&self, html: &str) -> Option<Url> {
        let src = self
            .patterns
            .iter()
            .find_map(|p| p.captures(html))
            .map(|caps| html_escape::decode_html_entities(&caps[1]).into_owned())?;
        self.transport.resolve(&src).ok()
    }

    /// Most recent challenge image, kept for diagnostics.
    pub fn last_image_base64(&self) -> Option<String> {
        self.last_image
            .lock()
            .as_ref()
            .map(|image| BASE64.encode(image))
    }

    /// Loads a fresh challenge for an operator.
    pub async fn view(&self) -> CaptchaView {
        let challenge = self.load_challenge().await;
        CaptchaView {
            image_base64: (!challenge.image.is_empty()).then(|| BASE64.encode(&challenge.image)),
            auto_resolved_text: challenge.auto_text().map(str::to_string),
            requires_manual_input: challenge.requires_manual_input,
            is_critical_error: challenge.critical_error,
            message: challenge.message,
        }
    }
}
