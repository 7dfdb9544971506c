use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Publication date used when the portal's date cell cannot be parsed.
pub const UNKNOWN_DATE: NaiveDate = NaiveDate::MIN;

/// One persisted cookie of the portal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// Sent only to `domain` itself, not to its subdomains.
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl SessionCookie {
    /// Host-only session cookie on `/`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_cookie_path(),
            expires: None,
            host_only: true,
            secure: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|at| at <= now).unwrap_or(false)
    }
}

/// 單次登入或文件驗證所載入的驗證碼
#[derive(Debug, Clone, Default)]
pub struct CaptchaChallenge {
    pub image: Vec<u8>,
    pub resolved_text: Option<String>,
    pub requires_manual_input: bool,
    pub critical_error: bool,
    pub message: String,
}

impl CaptchaChallenge {
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            critical_error: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn resolved(image: Vec<u8>, text: String) -> Self {
        Self {
            message: format!("CAPTCHA resolved automatically: {}", text),
            image,
            resolved_text: Some(text),
            requires_manual_input: false,
            critical_error: false,
        }
    }

    pub fn manual(image: Vec<u8>) -> Self {
        Self {
            image,
            resolved_text: None,
            requires_manual_input: true,
            critical_error: false,
            message: "OCR could not read the CAPTCHA, manual input required".to_string(),
        }
    }

    /// Text to submit, only when recognition was accepted.
    pub fn auto_text(&self) -> Option<&str> {
        if self.critical_error || self.requires_manual_input {
            return None;
        }
        self.resolved_text.as_deref()
    }
}

/// Serializable view of a challenge for operators solving it by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaView {
    pub image_base64: Option<String>,
    pub auto_resolved_text: Option<String>,
    pub requires_manual_input: bool,
    pub is_critical_error: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    pub company_name: String,
    pub register_number: String,
    pub register_office: String,
    pub manual_captcha: Option<String>,
}

impl SearchCriteria {
    pub fn new(
        company_name: impl Into<String>,
        register_number: impl Into<String>,
        register_office: impl Into<String>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            register_number: register_number.into(),
            register_office: register_office.into(),
            manual_captcha: None,
        }
    }

    pub fn with_manual_captcha(mut self, captcha: impl Into<String>) -> Self {
        self.manual_captcha = Some(captcha.into());
        self
    }

    /// Manual CAPTCHA text, ignoring blank input.
    pub fn manual_captcha(&self) -> Option<&str> {
        self.manual_captcha
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// 一筆 Türkiye Ticaret Sicili Gazetesi 公告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GazetteRecord {
    pub register_office: String,
    pub register_number: String,
    pub company_title: String,
    pub publication_date: String,
    pub publish_date: NaiveDate,
    pub issue_number: String,
    pub page_number: String,
    pub announcement_type: String,
    pub pdf_url: String,
    pub visit_url: String,
    pub announcement_id: String,
}

impl GazetteRecord {
    pub fn has_known_date(&self) -> bool {
        self.publish_date != UNKNOWN_DATE
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub records: Vec<GazetteRecord>,
    /// Count announced by the result page header, when present.
    pub reported_total: Option<usize>,
    /// Fewer rows parsed than the page announced.
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Digital,
    Ocr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
}

/// 登入流程的結果，可在等待同一次登入的呼叫者之間共享
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    LoggedIn,
    CaptchaRequired {
        message: String,
        captcha_image: Option<String>,
    },
    Rejected {
        message: String,
        captcha_image: Option<String>,
    },
    Failed {
        message: String,
    },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::LoggedIn)
    }

    pub fn message(&self) -> &str {
        match self {
            LoginOutcome::LoggedIn => "Login successful",
            LoginOutcome::CaptchaRequired { message, .. }
            | LoginOutcome::Rejected { message, .. }
            | LoginOutcome::Failed { message } => message,
        }
    }

    pub fn captcha_image(&self) -> Option<&str> {
        match self {
            LoginOutcome::CaptchaRequired { captcha_image, .. }
            | LoginOutcome::Rejected { captcha_image, .. } => captcha_image.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    CaptchaRequired,
    CaptchaUnavailable,
    LoginFailed,
    SessionExpired,
    NetworkError,
    DocumentError,
    InvalidRequest,
    InternalError,
}

/// Envelope every boundary operation answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ResponseCode>,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_image: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            data: Some(data),
            partial: false,
            captcha_image: None,
        }
    }

    pub fn failure(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code),
            data: None,
            partial: false,
            captcha_image: None,
        }
    }

    pub fn with_captcha_image(mut self, image: Option<String>) -> Self {
        self.captcha_image = image;
        self
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn is_captcha_required(&self) -> bool {
        self.code == Some(ResponseCode::CaptchaRequired)
    }
}
