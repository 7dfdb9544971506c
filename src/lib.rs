pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{HttpPortal, LocalStorage, PdfiumRenderer, SessionJar, TesseractCli};
pub use config::PortalConfig;
pub use core::{
    auth::Authenticator, captcha::CaptchaResolver, retry::execute_with_retry, search::SearchEngine,
    service::GazetteService, session::SessionStore,
};
pub use domain::model::{
    ApiResponse, CaptchaView, ExtractedDocument, ExtractionMethod, GazetteRecord, LoginOutcome,
    ResponseCode, SearchCriteria, SessionCookie,
};
pub use utils::error::{Result, SicilError};
