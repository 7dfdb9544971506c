// Adapters layer: concrete implementations of the domain ports (storage, http, ocr, pdf).

pub mod http;
pub mod jar;
pub mod ocr;
pub mod pdf;
pub mod storage;

pub use http::HttpPortal;
pub use jar::SessionJar;
pub use ocr::TesseractCli;
pub use pdf::PdfiumRenderer;
pub use storage::LocalStorage;
