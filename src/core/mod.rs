pub mod auth;
pub mod captcha;
pub mod document;
pub mod recognition;
pub mod retry;
pub mod search;
pub mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::model::{ApiResponse, GazetteRecord, SearchCriteria};
pub use crate::domain::ports::{AnnouncementMatcher, OcrEngine, PdfRenderer, PortalTransport, Storage};
pub use crate::utils::error::Result;
