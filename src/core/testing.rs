//! Scripted test doubles for the portal transport and PDF backend.

use crate::config::PortalConfig;
use crate::domain::ports::{PdfRenderer, PortalTransport, PostResponse};
use crate::utils::error::{Result, SicilError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

pub const EXPIRED_MARKER: &str = "üye girişi yapmanız gerekmektedir";
pub const LOGIN_PATH: &str = "view/modal/uyegirisi_ok.php";
pub const SEARCH_PATH: &str = "view/hizlierisim/ilangoruntuleme_ok.php";
pub const CAPTCHA_PATH: &str = "/captcha/captcha.php?r=42";

pub const LANDING_PAGE: &str = r#"<html><body>
    <form id="UyeGirisi"><img id="CaptchaImg" src="/captcha/captcha.php?r=42" /></form>
    </body></html>"#;

pub fn test_config() -> PortalConfig {
    let mut config = PortalConfig::default();
    config.credentials.email = "bot@example.com".to_string();
    config.credentials.password = "secret".to_string();
    config
}

fn not_scripted(what: &str, key: &str) -> SicilError {
    SicilError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no scripted {} for {}", what, key),
    ))
}

/// Portal double: responses are queued per path, the last one repeats.
pub struct ScriptedPortal {
    base: Url,
    pages: Mutex<HashMap<String, VecDeque<String>>>,
    binaries: Mutex<HashMap<String, Vec<u8>>>,
    posts: Mutex<HashMap<String, VecDeque<String>>>,
    pub post_log: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub get_log: Mutex<Vec<String>>,
    pub saves: AtomicUsize,
    pub post_delay: Duration,
}

impl ScriptedPortal {
    pub fn new() -> Self {
        Self {
            base: Url::parse("https://www.ticaretsicil.gov.tr/").expect("static url"),
            pages: Mutex::new(HashMap::new()),
            binaries: Mutex::new(HashMap::new()),
            posts: Mutex::new(HashMap::new()),
            post_log: Mutex::new(Vec::new()),
            get_log: Mutex::new(Vec::new()),
            saves: AtomicUsize::new(0),
            post_delay: Duration::ZERO,
        }
    }

    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    fn key(&self, url: &str) -> String {
        match self.resolve(url) {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            },
            Err(_) => url.to_string(),
        }
    }

    pub fn page(&self, path: &str, body: &str) {
        let key = self.key(path);
        self.pages
            .lock()
            .entry(key)
            .or_default()
            .push_back(body.to_string());
    }

    pub fn binary(&self, path: &str, bytes: Vec<u8>) {
        let key = self.key(path);
        self.binaries.lock().insert(key, bytes);
    }

    pub fn post(&self, path: &str, body: &str) {
        let key = self.key(path);
        self.posts
            .lock()
            .entry(key)
            .or_default()
            .push_back(body.to_string());
    }

    pub fn post_count(&self, path: &str) -> usize {
        let key = self.key(path);
        self.post_log.lock().iter().filter(|(p, _)| *p == key).count()
    }

    pub fn posted_fields(&self, path: &str) -> Vec<Vec<(String, String)>> {
        let key = self.key(path);
        self.post_log
            .lock()
            .iter()
            .filter(|(p, _)| *p == key)
            .map(|(_, fields)| fields.clone())
            .collect()
    }

    pub fn get_count(&self, path: &str) -> usize {
        let key = self.key(path);
        self.get_log.lock().iter().filter(|p| **p == key).count()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn next(queue: &mut VecDeque<String>) -> Option<String> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl PortalTransport for ScriptedPortal {
    fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.base.join(url.trim())?)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let key = self.key(url);
        self.get_log.lock().push(key.clone());
        let body = self.pages.lock().get_mut(&key).and_then(Self::next);
        body.ok_or_else(|| not_scripted("page", &key))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let key = self.key(url);
        self.get_log.lock().push(key.clone());
        let bytes = self.binaries.lock().get(&key).cloned();
        bytes.ok_or_else(|| not_scripted("binary", &key))
    }

    async fn post_multipart(&self, url: &str, fields: &[(&str, &str)]) -> Result<PostResponse> {
        let key = self.key(url);
        self.post_log.lock().push((
            key.clone(),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));

        if !self.post_delay.is_zero() {
            tokio::time::sleep(self.post_delay).await;
        }

        let body = self
            .posts
            .lock()
            .get_mut(&key)
            .and_then(Self::next)
            .ok_or_else(|| not_scripted("post", &key))?;

        if self.is_session_expired(&body) {
            return Err(SicilError::SessionExpired);
        }

        Ok(PostResponse {
            body,
            final_url: self.resolve(url)?,
        })
    }

    fn is_session_expired(&self, body: &str) -> bool {
        body.contains(EXPIRED_MARKER)
    }

    async fn save_session(&self) {
        self.saves.fetch_add(1, Ordering::SeqCst);
    }

    async fn restore_session(&self) -> usize {
        0
    }
}

/// PDF backend double with fixed per-page text and rasters.
#[derive(Default)]
pub struct FakePdf {
    pub texts: Vec<String>,
    pub render_calls: AtomicUsize,
    pub scales: Mutex<Vec<f32>>,
}

impl FakePdf {
    pub fn with_pages(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl PdfRenderer for FakePdf {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>> {
        if !pdf.starts_with(b"%PDF") {
            return Err(SicilError::Pdf {
                message: "not a PDF".to_string(),
            });
        }
        Ok(self.texts.clone())
    }

    fn render_pages(&self, _pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        self.scales.lock().push(scale);
        Ok(self
            .texts
            .iter()
            .enumerate()
            .map(|(i, _)| format!("png-{}", i).into_bytes())
            .collect())
    }
}
