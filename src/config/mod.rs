#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{Result, SicilError};
use crate::utils::validation::{self, Validate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var regex is hardcoded and valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub portal: PortalSection,
    pub credentials: CredentialsSection,
    pub session: SessionSection,
    pub ocr: OcrSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSection {
    pub base_url: String,
    pub login_path: String,
    pub search_path: String,
    /// Relative document paths from the result table are joined onto this.
    pub document_view_path: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub session_expired_marker: String,
    pub verification_marker: String,
    pub captcha_element_id: String,
    pub login_success_marker: String,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            base_url: "https://www.ticaretsicil.gov.tr/".to_string(),
            login_path: "view/modal/uyegirisi_ok.php".to_string(),
            search_path: "view/hizlierisim/ilangoruntuleme_ok.php".to_string(),
            document_view_path: "view/hizlierisim/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            timeout_seconds: 120,
            session_expired_marker: "üye girişi yapmanız gerekmektedir".to_string(),
            verification_marker: "id=\"DogrulamaForm\"".to_string(),
            captcha_element_id: "CaptchaImg".to_string(),
            login_success_marker: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub file: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            file: "session.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    pub tesseract_binary: String,
    pub tessdata_dir: Option<String>,
    /// Directory holding libpdfium; system paths are searched otherwise.
    pub pdfium_library_dir: Option<String>,
    pub captcha_languages: String,
    pub document_languages: String,
    /// Page upscaling factor; 2.0 keeps small registry numbers legible.
    pub render_scale: f32,
    pub min_digital_text_length: usize,
    pub min_captcha_length: usize,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            tesseract_binary: "tesseract".to_string(),
            tessdata_dir: None,
            pdfium_library_dir: None,
            captcha_languages: "eng".to_string(),
            document_languages: "tur+eng".to_string(),
            render_scale: 2.0,
            min_digital_text_length: 100,
            min_captcha_length: 4,
        }
    }
}

impl PortalConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| SicilError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SICIL_PASSWORD})
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.portal.timeout_seconds)
    }

    pub fn session_path(&self) -> PathBuf {
        PathBuf::from(&self.session.file)
    }

    /// Builds the visit URL for a relative document path from the result table.
    pub fn visit_url(&self, relative: &str) -> String {
        let relative = relative.trim();
        if relative.starts_with("http://") || relative.starts_with("https://") {
            return relative.to_string();
        }
        format!(
            "{}/{}/{}",
            self.portal.base_url.trim_end_matches('/'),
            self.portal.document_view_path.trim_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

impl Validate for PortalConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("portal.base_url", &self.portal.base_url)?;
        validation::validate_non_empty_string("portal.login_path", &self.portal.login_path)?;
        validation::validate_non_empty_string("portal.search_path", &self.portal.search_path)?;
        validation::validate_non_empty_string(
            "portal.session_expired_marker",
            &self.portal.session_expired_marker,
        )?;
        validation::validate_range("portal.timeout_seconds", self.portal.timeout_seconds, 1, 3600)?;
        validation::validate_non_empty_string("credentials.email", &self.credentials.email)?;
        validation::validate_non_empty_string("credentials.password", &self.credentials.password)?;
        validation::validate_path("session.file", &self.session.file)?;
        validation::validate_range("ocr.render_scale", self.ocr.render_scale, 1.0, 6.0)?;
        validation::validate_range("ocr.min_captcha_length", self.ocr.min_captcha_length, 1, 32)?;
        Ok(())
    }
}
