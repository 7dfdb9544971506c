use crate::adapters::jar::SessionJar;
use crate::config::PortalConfig;
use crate::core::session::SessionStore;
use crate::domain::ports::{PortalTransport, PostResponse, Storage};
use crate::utils::error::{Result, SicilError};
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// reqwest-backed transport for the registry portal.
///
/// Owns the in-memory cookie jar for the process lifetime and is the only
/// writer of session snapshots.
pub struct HttpPortal<S: Storage> {
    client: Client,
    jar: SessionJar,
    base_url: Url,
    session_expired_marker: String,
    store: SessionStore<S>,
}

impl<S: Storage> HttpPortal<S> {
    pub fn new(config: &PortalConfig, store: SessionStore<S>) -> Result<Self> {
        let jar = SessionJar::new();
        let client = Client::builder()
            .cookie_provider(jar.provider())
            .user_agent(config.portal.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            jar,
            base_url: Url::parse(&config.portal.base_url)?,
            session_expired_marker: config.portal.session_expired_marker.clone(),
            store,
        })
    }

    pub fn jar(&self) -> &SessionJar {
        &self.jar
    }

}

#[async_trait]
impl<S: Storage + 'static> PortalTransport for HttpPortal<S> {
    fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.base_url.join(url.trim())?)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let url = self.resolve(url)?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let url = self.resolve(url)?;
        tracing::debug!("GET (binary) {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        tracing::debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn post_multipart(&self, url: &str, fields: &[(&str, &str)]) -> Result<PostResponse> {
        let url = self.resolve(url)?;
        let form = fields.iter().fold(Form::new(), |form, (name, value)| {
            form.text(name.to_string(), value.to_string())
        });

        tracing::debug!("POST {} ({} fields)", url, fields.len());
        let response = self.client.post(url.clone()).multipart(form).send().await?;
        let final_url = response.url().clone();
        let body = response.text().await?.trim().to_string();

        // 登出時入口網站會把 POST 轉回首頁
        if final_url.path() != url.path() {
            tracing::warn!("POST to {} was redirected to {}", url, final_url);
            return Err(SicilError::SessionExpired);
        }
        // 入口網站不用 HTTP 狀態碼表示登出，只能看內容
        if self.is_session_expired(&body) {
            tracing::warn!("Session-expired marker found in response from {}", final_url);
            return Err(SicilError::SessionExpired);
        }

        Ok(PostResponse { body, final_url })
    }

    fn is_session_expired(&self, body: &str) -> bool {
        body.contains(&self.session_expired_marker)
    }

    async fn save_session(&self) {
        let cookies = self.jar.snapshot();
        if !self.store.save(&cookies).await {
            tracing::warn!("Session was not persisted; next start will need a fresh login");
        }
    }

    async fn restore_session(&self) -> usize {
        match self.store.load().await {
            Some(cookies) => {
                let count = self.jar.replace(cookies);
                tracing::info!("Restored {} cookies from the persisted session", count);
                count
            }
            None => 0,
        }
    }
}
