//! Cookie jar shared by every portal request.
//!
//! Cookie semantics (domain and path matching, `Secure`, `Expires`,
//! `Max-Age`) are left to `cookie_store`. This module only maps its
//! contents to and from the [`SessionCookie`] records kept on disk.

use crate::domain::model::SessionCookie;
use chrono::{DateTime, Utc};
use cookie_store::{CookieDomain, CookieExpiration, CookieStore, RawCookie};
use reqwest_cookie_store::CookieStoreMutex;
use std::sync::{Arc, MutexGuard, PoisonError};
use url::Url;

#[derive(Debug, Default)]
pub struct SessionJar {
    store: Arc<CookieStoreMutex>,
}

impl SessionJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle given to `reqwest::ClientBuilder::cookie_provider`.
    pub fn provider(&self) -> Arc<CookieStoreMutex> {
        self.store.clone()
    }

    /// Live cookies, session cookies included.
    pub fn snapshot(&self) -> Vec<SessionCookie> {
        self.lock().iter_unexpired().filter_map(to_record).collect()
    }

    /// Replaces the whole jar, as done when a persisted session is restored.
    /// Returns how many records were accepted.
    pub fn replace(&self, cookies: Vec<SessionCookie>) -> usize {
        let now = Utc::now();
        let mut store = self.lock();
        *store = CookieStore::default();

        let mut accepted = 0;
        for record in cookies.iter().filter(|c| !c.is_expired(now)) {
            match insert_record(&mut store, record) {
                Ok(()) => accepted += 1,
                Err(e) => tracing::warn!("Skipping persisted cookie '{}': {}", record.name, e),
            }
        }
        accepted
    }

    pub fn get(&self, name: &str) -> Option<SessionCookie> {
        self.lock()
            .iter_unexpired()
            .filter(|c| c.name() == name)
            .find_map(to_record)
    }

    fn lock(&self) -> MutexGuard<'_, CookieStore> {
        // 中毒的鎖內容仍是完整的 cookie 集合
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_record(cookie: &cookie_store::Cookie<'_>) -> Option<SessionCookie> {
    let (domain, host_only) = match &cookie.domain {
        CookieDomain::HostOnly(host) => (host.clone(), true),
        CookieDomain::Suffix(suffix) => (suffix.clone(), false),
        _ => return None,
    };
    let expires = match &cookie.expires {
        CookieExpiration::AtUtc(at) => DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0),
        CookieExpiration::SessionEnd => None,
    };

    Some(SessionCookie {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain,
        path: String::from(&cookie.path),
        expires,
        host_only,
        secure: cookie.secure().unwrap_or(false),
    })
}

/// Replays a record as the `Set-Cookie` line the portal would have sent.
fn insert_record(store: &mut CookieStore, record: &SessionCookie) -> Result<(), String> {
    let scheme = if record.secure { "https" } else { "http" };
    let origin = Url::parse(&format!("{}://{}{}", scheme, record.domain, record.path))
        .map_err(|e| e.to_string())?;

    let mut header = format!("{}={}; Path={}", record.name, record.value, record.path);
    if !record.host_only {
        header.push_str(&format!("; Domain={}", record.domain));
    }
    if record.secure {
        header.push_str("; Secure");
    }
    if let Some(at) = record.expires {
        header.push_str(&format!("; Expires={}", at.format("%a, %d %b %Y %H:%M:%S GMT")));
    }

    let raw = RawCookie::parse(header).map_err(|e| e.to_string())?;
    store
        .insert_raw(&raw, &origin)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::cookie::CookieStore as _;
    use reqwest::header::HeaderValue;

    fn receive(jar: &SessionJar, url: &str, headers: &[&'static str]) {
        let url = Url::parse(url).unwrap();
        let values: Vec<HeaderValue> = headers.iter().map(|h| HeaderValue::from_static(h)).collect();
        jar.provider().set_cookies(&mut values.iter(), &url);
    }

    fn cookie_header(jar: &SessionJar, url: &str) -> Option<String> {
        let url = Url::parse(url).unwrap();
        jar.provider()
            .cookies(&url)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_received_cookie_is_host_only_by_default() {
        let jar = SessionJar::new();
        receive(&jar, "https://www.ticaretsicil.gov.tr/view/modal/uyegirisi_ok.php", &["PHPSESSID=abc; path=/"]);

        let cookie = jar.get("PHPSESSID").unwrap();
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.domain, "www.ticaretsicil.gov.tr");
        assert!(cookie.host_only);
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.expires, None);

        assert_eq!(
            cookie_header(&jar, "https://www.ticaretsicil.gov.tr/index.php").as_deref(),
            Some("PHPSESSID=abc")
        );
        assert_eq!(cookie_header(&jar, "https://sub.www.ticaretsicil.gov.tr/"), None);
    }

    #[test]
    fn test_domain_cookie_reaches_subdomains() {
        let jar = SessionJar::new();
        receive(
            &jar,
            "https://www.ticaretsicil.gov.tr/",
            &["lang=tr; Domain=.ticaretsicil.gov.tr; Path=/"],
        );

        let cookie = jar.get("lang").unwrap();
        assert_eq!(cookie.domain, "ticaretsicil.gov.tr");
        assert!(!cookie.host_only);
        assert!(cookie_header(&jar, "https://cdn.ticaretsicil.gov.tr/a.pdf").is_some());
        assert_eq!(cookie_header(&jar, "https://example.com/"), None);
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let jar = SessionJar::new();
        receive(&jar, "https://www.ticaretsicil.gov.tr/", &["token=t1; Path=/; Secure"]);

        assert!(jar.get("token").unwrap().secure);
        assert_eq!(cookie_header(&jar, "http://www.ticaretsicil.gov.tr/"), None);
        assert!(cookie_header(&jar, "https://www.ticaretsicil.gov.tr/").is_some());
    }

    #[test]
    fn test_max_age_zero_deletes() {
        let jar = SessionJar::new();
        let url = "https://www.ticaretsicil.gov.tr/";
        receive(&jar, url, &["PHPSESSID=abc; Path=/"]);
        receive(&jar, url, &["PHPSESSID=gone; Path=/; Max-Age=0"]);

        assert!(jar.get("PHPSESSID").is_none());
        assert!(jar.snapshot().is_empty());
    }

    #[test]
    fn test_replace_round_trips_records() {
        let expires = Utc.with_ymd_and_hms(2031, 3, 4, 5, 6, 7).unwrap();
        let records = vec![
            SessionCookie::new("PHPSESSID", "persisted", "www.ticaretsicil.gov.tr"),
            SessionCookie {
                name: "remember".to_string(),
                value: "yes".to_string(),
                domain: "ticaretsicil.gov.tr".to_string(),
                path: "/view".to_string(),
                expires: Some(expires),
                host_only: false,
                secure: true,
            },
        ];

        let jar = SessionJar::new();
        assert_eq!(jar.replace(records.clone()), 2);

        let mut restored = jar.snapshot();
        restored.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(restored, records);
        assert_eq!(
            cookie_header(&jar, "https://www.ticaretsicil.gov.tr/view/x.php").map(|h| h.len()),
            Some("PHPSESSID=persisted; remember=yes".len())
        );
    }

    #[test]
    fn test_replace_drops_expired_and_previous_cookies() {
        let jar = SessionJar::new();
        receive(&jar, "https://www.ticaretsicil.gov.tr/", &["old=1; Path=/"]);

        let mut stale = SessionCookie::new("PHPSESSID", "stale", "www.ticaretsicil.gov.tr");
        stale.expires = Some(Utc::now() - chrono::Duration::hours(1));
        let fresh = SessionCookie::new("lang", "tr", "www.ticaretsicil.gov.tr");

        assert_eq!(jar.replace(vec![stale, fresh]), 1);
        let names: Vec<String> = jar.snapshot().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["lang".to_string()]);
    }
}
