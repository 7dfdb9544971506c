use crate::domain::model::SearchCriteria;
use crate::utils::error::Result;
use async_trait::async_trait;
use url::Url;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Body and final URL (after redirects) of a form submission.
#[derive(Debug, Clone)]
pub struct PostResponse {
    pub body: String,
    pub final_url: Url,
}

/// The only component that talks to the portal.
///
/// Implementations must fail POSTs with `SicilError::SessionExpired` when the
/// response body carries the portal's login-required marker or when the
/// request was redirected away from the path it was sent to.
#[async_trait]
pub trait PortalTransport: Send + Sync {
    /// Resolves a possibly relative portal path against the base URL.
    fn resolve(&self, url: &str) -> Result<Url>;

    async fn get_text(&self, url: &str) -> Result<String>;

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    async fn post_multipart(&self, url: &str, fields: &[(&str, &str)]) -> Result<PostResponse>;

    /// Whether a page body says the caller is not logged in.
    fn is_session_expired(&self, body: &str) -> bool;

    /// Persists the current cookie jar; failures are logged, never raised.
    async fn save_session(&self);

    /// Loads persisted cookies into the jar, returning how many were restored.
    async fn restore_session(&self) -> usize;
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognizes text in a PNG image with the given tesseract language string
    /// (for example `eng` or `tur+eng`).
    async fn recognize(&self, png: &[u8], languages: &str) -> Result<String>;
}

/// Synchronous PDF backend; callers run it on the blocking pool.
pub trait PdfRenderer: Send + Sync {
    /// Embedded text layer of every page, in page order.
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>>;

    /// Every page rasterized at `scale` and encoded as PNG.
    fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>>;
}

/// Finds the announcement block for a company inside a full gazette text.
#[async_trait]
pub trait AnnouncementMatcher: Send + Sync {
    async fn match_announcement(
        &self,
        full_text: &str,
        criteria: &SearchCriteria,
    ) -> Result<Option<String>>;
}
