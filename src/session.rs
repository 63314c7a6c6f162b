//! Provider session cookies.
//!
//! A [`ProviderSession`] is loaded once from the persisted configuration,
//! replaced in place by a successful login, and written back before exit.
//! Cookies are sent as a plain `Cookie` header, but only to hosts inside the
//! cookie's domain, so a NetEase login never reaches another provider or a
//! third-party media CDN. Path scoping is not applied.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current time as Unix seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A single persisted cookie.
///
/// The value field is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    /// Unix timestamp for expiry (0 = session cookie).
    #[serde(default)]
    pub expires: u64,
}

impl StoredCookie {
    /// Creates a cookie scoped to `domain` and `/`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        expires: u64,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires,
        }
    }

    /// Converts a `Set-Cookie` entry captured from a response to `request_host`.
    ///
    /// `Max-Age` wins over `Expires`; neither yields a session cookie. A cookie
    /// without a `Domain` attribute is scoped to `request_host`.
    #[must_use]
    pub fn from_response(
        cookie: &reqwest::cookie::Cookie<'_>,
        request_host: &str,
        now: u64,
    ) -> Self {
        let expires = cookie
            .max_age()
            .map(|age| now.saturating_add(age.as_secs()))
            .or_else(|| {
                cookie
                    .expires()
                    .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
                    .map(|since| since.as_secs())
            })
            .unwrap_or(0);
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().unwrap_or(request_host).to_string(),
            path: cookie.path().unwrap_or("/").to_string(),
            expires,
        }
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the cookie is still valid at `now`.
    ///
    /// Session cookies (`expires == 0`) do not survive a restart and are
    /// treated as expired once persisted.
    #[must_use]
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.expires > now
    }

    /// Whether `host` lies inside the cookie's domain.
    ///
    /// `.music.163.com` and `music.163.com` both match `music.163.com` and
    /// `interface.music.163.com`. A cookie without a domain matches nothing.
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() || host.is_empty() {
            return false;
        }
        host == domain
            || host
                .strip_suffix(&domain)
                .is_some_and(|rest| rest.ends_with('.'))
    }

    /// Remaining lifetime at `now`, if any.
    #[must_use]
    pub fn remaining(&self, now: u64) -> Option<Duration> {
        self.is_valid_at(now)
            .then(|| Duration::from_secs(self.expires - now))
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Provider-scoped authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSession {
    cookies: Vec<StoredCookie>,
}

impl ProviderSession {
    #[must_use]
    pub fn new(cookies: Vec<StoredCookie>) -> Self {
        Self { cookies }
    }

    #[must_use]
    pub fn cookies(&self) -> &[StoredCookie] {
        &self.cookies
    }

    /// Consumes the session, returning its cookies for persistence.
    #[must_use]
    pub fn into_cookies(self) -> Vec<StoredCookie> {
        self.cookies
    }

    /// True when a cookie named `cookie_name` (case-insensitive) is unexpired at `now`.
    #[must_use]
    pub fn is_authenticated(&self, cookie_name: &str, now: u64) -> bool {
        self.cookies
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(cookie_name) && c.is_valid_at(now))
    }

    /// Renders the unexpired cookies scoped to `host` as a `Cookie` header value.
    #[must_use]
    pub fn cookie_header(&self, host: &str, now: u64) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.is_valid_at(now) && c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Replaces the whole cookie set. Only called after a successful login.
    pub fn replace_cookies(&mut self, cookies: Vec<StoredCookie>) {
        debug!(count = cookies.len(), "replacing session cookies");
        self.cookies = cookies;
    }
}
