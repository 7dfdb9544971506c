use crate::domain::model::SessionCookie;
use crate::domain::ports::Storage;
use crate::utils::error::SicilError;
use tokio::sync::Mutex;

/// Persists the portal cookie list between process restarts.
///
/// Loads and saves on one instance are serialized, so a reader never sees a
/// half-written file and two writers never interleave. Every save overwrites
/// the whole file.
pub struct SessionStore<S: Storage> {
    storage: S,
    file_name: String,
    lock: Mutex<()>,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns `None` when nothing usable is stored.
    pub async fn load(&self) -> Option<Vec<SessionCookie>> {
        let _guard = self.lock.lock().await;

        let data = match self.storage.read_file(&self.file_name).await {
            Ok(data) => data,
            Err(SicilError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No persisted session at {}", self.file_name);
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read session file {}: {}", self.file_name, e);
                return None;
            }
        };

        match serde_json::from_slice::<Vec<SessionCookie>>(&data) {
            Ok(cookies) => {
                tracing::debug!("Loaded {} session cookies", cookies.len());
                Some(cookies)
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt session file {}: {}", self.file_name, e);
                None
            }
        }
    }

    /// Fails soft: a lost session only costs a re-login, so errors are logged
    /// and reported as `false`.
    pub async fn save(&self, cookies: &[SessionCookie]) -> bool {
        let _guard = self.lock.lock().await;

        let json = match serde_json::to_vec_pretty(cookies) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize session: {}", e);
                return false;
            }
        };

        match self.storage.write_file(&self.file_name, &json).await {
            Ok(()) => {
                tracing::debug!("Saved {} session cookies to {}", cookies.len(), self.file_name);
                true
            }
            Err(e) => {
                tracing::error!("Failed to save session to {}: {}", self.file_name, e);
                false
            }
        }
    }
}
