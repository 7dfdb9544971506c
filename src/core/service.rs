use crate::adapters::{HttpPortal, LocalStorage, PdfiumRenderer, TesseractCli};
use crate::config::PortalConfig;
use crate::core::auth::Authenticator;
use crate::core::captcha::CaptchaResolver;
use crate::core::document::{DocumentFetcher, TextExtractor};
use crate::core::retry::execute_with_retry;
use crate::core::search::SearchEngine;
use crate::core::session::SessionStore;
use crate::domain::model::{
    ApiResponse, CaptchaView, ExtractedDocument, GazetteRecord, LoginOutcome, ResponseCode,
    SearchCriteria,
};
use crate::domain::ports::{AnnouncementMatcher, OcrEngine, PdfRenderer, PortalTransport};
use crate::utils::error::{Result, SicilError};
use std::sync::Arc;

/// Boundary of the client: every operation answers with an [`ApiResponse`]
/// and never lets an internal error escape unformatted.
pub struct GazetteService {
    transport: Arc<dyn PortalTransport>,
    captcha: Arc<CaptchaResolver>,
    auth: Authenticator,
    search: SearchEngine,
    documents: DocumentFetcher,
    extractor: TextExtractor,
}

impl GazetteService {
    pub fn new(
        config: &PortalConfig,
        transport: Arc<dyn PortalTransport>,
        ocr: Arc<dyn OcrEngine>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Self {
        let captcha = Arc::new(CaptchaResolver::new(config, transport.clone(), ocr.clone()));

        Self {
            auth: Authenticator::new(config, transport.clone(), captcha.clone()),
            search: SearchEngine::new(config, transport.clone()),
            documents: DocumentFetcher::new(config, transport.clone(), captcha.clone()),
            extractor: TextExtractor::new(&config.ocr, renderer, ocr),
            transport,
            captcha,
        }
    }

    /// Wires the reqwest transport, the session file, tesseract and pdfium,
    /// then restores any persisted cookies.
    pub async fn connect(config: &PortalConfig) -> Result<Self> {
        let (storage, file_name) = LocalStorage::for_file(&config.session_path());
        let store = SessionStore::new(storage, file_name);
        let portal: Arc<dyn PortalTransport> = Arc::new(HttpPortal::new(config, store)?);

        let restored = portal.restore_session().await;
        if restored > 0 {
            tracing::info!("Reusing persisted session ({} cookies); it is verified on first use", restored);
        }

        let ocr = Arc::new(TesseractCli::from_config(&config.ocr));
        if !ocr.is_available().await {
            tracing::warn!(
                "tesseract binary '{}' is not available; CAPTCHAs will need manual input",
                config.ocr.tesseract_binary
            );
        }

        let renderer = match &config.ocr.pdfium_library_dir {
            Some(dir) => PdfiumRenderer::with_library_dir(dir),
            None => PdfiumRenderer::new(),
        };
        Ok(Self::new(config, portal, ocr, Arc::new(renderer)))
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> ApiResponse<Vec<GazetteRecord>> {
        if !self.auth.is_authenticated() {
            let outcome = self.auth.ensure_logged_in(criteria.manual_captcha()).await;
            if let Some(response) = login_failure(outcome) {
                return response;
            }
        }

        match execute_with_retry(&self.auth, "search", || self.search.search(criteria)).await {
            Ok(outcome) => {
                let message = match outcome.reported_total {
                    Some(total) if outcome.partial => format!(
                        "{} records found, the portal reported {}",
                        outcome.records.len(),
                        total
                    ),
                    _ => format!("{} records found", outcome.records.len()),
                };
                ApiResponse::ok(message, outcome.records).with_partial(outcome.partial)
            }
            Err(e) => self.error_response("search", e),
        }
    }

    pub async fn document_text(&self, url: &str) -> ApiResponse<String> {
        match self.extract_document(url).await {
            Ok(doc) => ApiResponse::ok(
                format!("Text extracted from {} pages ({:?})", doc.page_count, doc.method),
                doc.text,
            ),
            Err(e) => self.error_response("document text", e),
        }
    }

    pub async fn document_bytes(&self, url: &str) -> ApiResponse<Vec<u8>> {
        let result = execute_with_retry(&self.auth, "document download", || {
            self.documents.fetch_pdf(url)
        })
        .await;

        match result {
            Ok(pdf) => ApiResponse::ok(format!("{} bytes downloaded", pdf.len()), pdf),
            Err(e) => self.error_response("document download", e),
        }
    }

    /// Fetches the gazette text and hands it to `matcher`.
    pub async fn extract_announcement(
        &self,
        url: &str,
        criteria: &SearchCriteria,
        matcher: &dyn AnnouncementMatcher,
    ) -> ApiResponse<Option<String>> {
        let doc = match self.extract_document(url).await {
            Ok(doc) => doc,
            Err(e) => return self.error_response("announcement extraction", e),
        };

        match matcher.match_announcement(&doc.text, criteria).await {
            Ok(Some(announcement)) => ApiResponse::ok("Announcement found", Some(announcement)),
            Ok(None) => {
                tracing::info!("No announcement for '{}' in {}", criteria.company_name, url);
                ApiResponse::ok("No matching announcement in the gazette", None)
            }
            Err(e) => self.error_response("announcement extraction", e),
        }
    }

    pub async fn captcha(&self) -> ApiResponse<CaptchaView> {
        let view = self.captcha.view().await;
        if view.is_critical_error {
            let mut response = ApiResponse::failure(ResponseCode::CaptchaUnavailable, view.message.clone());
            response.data = Some(view);
            return response;
        }
        ApiResponse::ok(view.message.clone(), view)
    }

    /// Landing page reachable; never raises.
    pub async fn health_check(&self) -> bool {
        match self.transport.get_text("/").await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                false
            }
        }
    }

    async fn extract_document(&self, url: &str) -> Result<ExtractedDocument> {
        execute_with_retry(&self.auth, "document text", || async move {
            let pdf = self.documents.fetch_pdf(url).await?;
            self.extractor.extract(pdf).await
        })
        .await
    }

    fn error_response<T>(&self, operation: &str, error: SicilError) -> ApiResponse<T> {
        tracing::error!(category = ?error.category(), "{} failed: {}", operation, error);

        let response = ApiResponse::failure(response_code(&error), error.user_friendly_message());
        // 續期失敗多半也是卡在驗證碼，一併附上圖片
        if error.requires_captcha() || matches!(error, SicilError::SessionRenewalFailed { .. }) {
            response.with_captcha_image(self.captcha.last_image_base64())
        } else {
            response
        }
    }
}

fn login_failure<T>(outcome: LoginOutcome) -> Option<ApiResponse<T>> {
    match outcome {
        LoginOutcome::LoggedIn => None,
        LoginOutcome::CaptchaRequired {
            message,
            captcha_image,
        } => Some(
            ApiResponse::failure(ResponseCode::CaptchaRequired, message).with_captcha_image(captcha_image),
        ),
        LoginOutcome::Rejected {
            message,
            captcha_image,
        } => Some(ApiResponse::failure(ResponseCode::LoginFailed, message).with_captcha_image(captcha_image)),
        LoginOutcome::Failed { message } => Some(ApiResponse::failure(ResponseCode::NetworkError, message)),
    }
}

pub fn response_code(error: &SicilError) -> ResponseCode {
    match error {
        SicilError::SessionExpired | SicilError::SessionRenewalFailed { .. } => ResponseCode::SessionExpired,
        SicilError::CaptchaRequiresManualInput { .. } => ResponseCode::CaptchaRequired,
        SicilError::CaptchaCriticalFailure { .. } => ResponseCode::CaptchaUnavailable,
        SicilError::Network(_) | SicilError::Url(_) => ResponseCode::NetworkError,
        SicilError::DocumentNotFound { .. }
        | SicilError::DocumentVerificationFailed { .. }
        | SicilError::DocumentExtraction { .. }
        | SicilError::Pdf { .. }
        | SicilError::Ocr { .. }
        | SicilError::Image(_) => ResponseCode::DocumentError,
        SicilError::Config { .. }
        | SicilError::InvalidConfigValue { .. }
        | SicilError::MissingConfig { .. }
        | SicilError::Validation { .. } => ResponseCode::InvalidRequest,
        SicilError::Io(_) | SicilError::Serialization(_) => ResponseCode::InternalError,
    }
}
