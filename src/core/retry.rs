use crate::core::auth::Authenticator;
use crate::utils::error::{Result, SicilError};
use std::future::Future;

/// Runs an authenticated operation, renewing the session once if the portal
/// reports it expired.
///
/// `action` runs at most twice. Only `SessionExpired` triggers the second
/// run, and only after a successful re-login; the second result is final.
pub async fn execute_with_retry<T, F, Fut>(auth: &Authenticator, operation: &str, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let seen = auth.generation();

    match action().await {
        Err(SicilError::SessionExpired) => {
            tracing::warn!("Session expired during {}, logging in again", operation);
            auth.invalidate();

            let outcome = auth.login_after(seen, None).await;
            if !outcome.is_success() {
                tracing::error!("Session renewal failed during {}: {}", operation, outcome.message());
                return Err(SicilError::SessionRenewalFailed {
                    message: outcome.message().to_string(),
                });
            }

            tracing::info!("Session renewed, retrying {}", operation);
            action().await
        }
        result => result,
    }
}
