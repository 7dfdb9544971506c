use crate::config::PortalConfig;
use crate::core::captcha::CaptchaResolver;
use crate::domain::model::LoginOutcome;
use crate::domain::ports::PortalTransport;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Drives the portal login and makes sure concurrent callers share one
/// round-trip.
///
/// Every finished attempt bumps a generation counter. A caller that saw
/// generation `n` before waiting on the gate and finds a newer one once it
/// gets in takes the stored outcome instead of logging in again. A failure
/// reached with hand-typed CAPTCHA text is never handed to an automatic
/// caller: a typo says nothing about what OCR would have read.
pub struct Authenticator {
    transport: Arc<dyn PortalTransport>,
    captcha: Arc<CaptchaResolver>,
    email: String,
    password: String,
    login_path: String,
    success_marker: String,
    authenticated: AtomicBool,
    generation: AtomicU64,
    gate: Mutex<Option<SharedOutcome>>,
}

/// Last finished attempt and whether it used manual CAPTCHA text.
#[derive(Debug, Clone)]
struct SharedOutcome {
    outcome: LoginOutcome,
    manual: bool,
}

impl SharedOutcome {
    fn applies_to(&self, captcha: Option<&str>) -> bool {
        // 成功一律共用；失敗只給同樣走 OCR 的呼叫者
        self.outcome.is_success() || (captcha.is_none() && !self.manual)
    }
}

impl Authenticator {
    pub fn new(
        config: &PortalConfig,
        transport: Arc<dyn PortalTransport>,
        captcha: Arc<CaptchaResolver>,
    ) -> Self {
        Self {
            transport,
            captcha,
            email: config.credentials.email.clone(),
            password: config.credentials.password.clone(),
            login_path: config.portal.login_path.clone(),
            success_marker: config.portal.login_success_marker.clone(),
            authenticated: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Advisory only: the portal can drop a session without telling us.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn invalidate(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn captcha(&self) -> &CaptchaResolver {
        &self.captcha
    }

    pub async fn login(&self, captcha: Option<&str>) -> LoginOutcome {
        let seen = self.generation();
        self.login_after(seen, captcha).await
    }

    pub async fn ensure_logged_in(&self, captcha: Option<&str>) -> LoginOutcome {
        let seen = self.generation();
        if self.is_authenticated() {
            return LoginOutcome::LoggedIn;
        }
        self.login_after(seen, captcha).await
    }

    /// Logs in unless an attempt finished after generation `seen` was read,
    /// in which case that attempt's outcome is returned.
    ///
    /// A caller carrying its own CAPTCHA text still tries when the shared
    /// attempt failed; the text it holds may be what the other one lacked.
    /// Likewise an automatic caller does not inherit a manual failure.
    pub async fn login_after(&self, seen: u64, captcha: Option<&str>) -> LoginOutcome {
        let mut last = self.gate.lock().await;

        if self.generation() != seen {
            if let Some(shared) = last.as_ref().filter(|shared| shared.applies_to(captcha)) {
                tracing::debug!("Sharing the outcome of a concurrent login attempt");
                return shared.outcome.clone();
            }
        }

        let outcome = self.attempt(captcha).await;
        *last = Some(SharedOutcome {
            outcome: outcome.clone(),
            manual: captcha.is_some(),
        });
        self.generation.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn attempt(&self, manual: Option<&str>) -> LoginOutcome {
        let captcha_text = match manual {
            Some(text) => {
                tracing::info!("Logging in with a manually supplied CAPTCHA");
                text.to_string()
            }
            None => {
                let challenge = self.captcha.load_challenge().await;
                let image = (!challenge.image.is_empty()).then(|| BASE64.encode(&challenge.image));
                match challenge.auto_text() {
                    Some(text) => text.to_string(),
                    None => {
                        tracing::warn!("Login needs a human: {}", challenge.message);
                        self.invalidate();
                        return LoginOutcome::CaptchaRequired {
                            message: challenge.message,
                            captcha_image: image,
                        };
                    }
                }
            }
        };

        tracing::info!("Submitting login for {}", self.email);
        tracing::debug!("CAPTCHA text: {}", captcha_text);

        let fields = [
            ("LoginEmail", self.email.as_str()),
            ("LoginSifre", self.password.as_str()),
            ("Captcha", captcha_text.as_str()),
        ];

        match self.transport.post_multipart(&self.login_path, &fields).await {
            // 必須完全等於成功標記，"10" 之類不算
            Ok(response) if response.body.trim() == self.success_marker => {
                self.authenticated.store(true, Ordering::SeqCst);
                tracing::info!("Login successful");
                self.transport.save_session().await;
                LoginOutcome::LoggedIn
            }
            Ok(response) => {
                self.invalidate();
                let reply: String = response.body.trim().chars().take(200).collect();
                tracing::warn!("Portal rejected the login: {}", reply);
                LoginOutcome::Rejected {
                    message: format!("Login rejected by the portal: {}", reply),
                    captcha_image: self.captcha.last_image_base64(),
                }
            }
            Err(e) => {
                self.invalidate();
                tracing::error!("Login request failed: {}", e);
                LoginOutcome::Failed {
                    message: e.user_friendly_message(),
                }
            }
        }
    }
}
