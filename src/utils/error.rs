use thiserror::Error;

#[derive(Error, Debug)]
pub enum SicilError {
    #[error("Session expired: the portal asked for a new login")]
    SessionExpired,

    #[error("CAPTCHA requires manual input: {message}")]
    CaptchaRequiresManualInput { message: String },

    #[error("CAPTCHA could not be loaded: {message}")]
    CaptchaCriticalFailure { message: String },

    #[error("Session could not be renewed: {message}")]
    SessionRenewalFailed { message: String },

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No PDF document found on page {url}")]
    DocumentNotFound { url: String },

    #[error("Document verification failed for {url}")]
    DocumentVerificationFailed { url: String },

    #[error("Document text extraction failed: {message}")]
    DocumentExtraction { message: String },

    #[error("PDF processing error: {message}")]
    Pdf { message: String },

    #[error("OCR error: {message}")]
    Ocr { message: String },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration value: {field}")]
    MissingConfig { field: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Session,
    Captcha,
    Network,
    Document,
    Configuration,
    Internal,
}

impl SicilError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SicilError::SessionExpired | SicilError::SessionRenewalFailed { .. } => {
                ErrorCategory::Session
            }
            SicilError::CaptchaRequiresManualInput { .. }
            | SicilError::CaptchaCriticalFailure { .. } => ErrorCategory::Captcha,
            SicilError::Network(_) | SicilError::Url(_) => ErrorCategory::Network,
            SicilError::DocumentNotFound { .. }
            | SicilError::DocumentVerificationFailed { .. }
            | SicilError::DocumentExtraction { .. }
            | SicilError::Pdf { .. }
            | SicilError::Ocr { .. }
            | SicilError::Image(_) => ErrorCategory::Document,
            SicilError::Config { .. }
            | SicilError::InvalidConfigValue { .. }
            | SicilError::MissingConfig { .. }
            | SicilError::Validation { .. } => ErrorCategory::Configuration,
            SicilError::Io(_) | SicilError::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// 是否只能靠人工輸入驗證碼恢復
    pub fn requires_captcha(&self) -> bool {
        matches!(self, SicilError::CaptchaRequiresManualInput { .. })
    }

    /// 給呼叫端看的訊息，不外洩內部細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            SicilError::SessionExpired => "Portal session expired".to_string(),
            SicilError::CaptchaRequiresManualInput { .. } => {
                "Manual CAPTCHA input is required".to_string()
            }
            SicilError::CaptchaCriticalFailure { message } => {
                format!("CAPTCHA could not be loaded: {}", message)
            }
            SicilError::SessionRenewalFailed { message } => {
                format!("Session could not be renewed: {}", message)
            }
            SicilError::Network(e) if e.is_timeout() => "Portal request timed out".to_string(),
            SicilError::Network(_) | SicilError::Url(_) => {
                "Portal could not be reached".to_string()
            }
            SicilError::DocumentNotFound { .. } => {
                "No PDF document was found on the gazette page".to_string()
            }
            SicilError::DocumentVerificationFailed { .. } => {
                "The gazette page rejected the verification code".to_string()
            }
            SicilError::DocumentExtraction { .. }
            | SicilError::Pdf { .. }
            | SicilError::Ocr { .. }
            | SicilError::Image(_) => "Gazette text could not be extracted".to_string(),
            SicilError::Config { .. }
            | SicilError::InvalidConfigValue { .. }
            | SicilError::MissingConfig { .. }
            | SicilError::Validation { .. } => self.to_string(),
            SicilError::Io(_) | SicilError::Serialization(_) => {
                "Internal error while processing the request".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SicilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(SicilError::SessionExpired.category(), ErrorCategory::Session);
        assert_eq!(
            SicilError::CaptchaRequiresManualInput {
                message: "x".to_string()
            }
            .category(),
            ErrorCategory::Captcha
        );
        assert_eq!(
            SicilError::DocumentNotFound {
                url: "u".to_string()
            }
            .category(),
            ErrorCategory::Document
        );
    }

    #[test]
    fn test_requires_captcha_only_for_manual_input() {
        assert!(SicilError::CaptchaRequiresManualInput {
            message: String::new()
        }
        .requires_captcha());
        assert!(!SicilError::CaptchaCriticalFailure {
            message: String::new()
        }
        .requires_captcha());
        assert!(!SicilError::SessionExpired.requires_captcha());
    }
}
