//! Provider request protocol.
//!
//! Every (provider, resource kind) pair implements [`MusicRequest`], a
//! four-stage protocol driven by [`resolve_tracks`]:
//!
//! ```text
//! Created -> require_login? -> [NotAuthenticated -> login -> Authenticated]
//!         -> execute -> Executed -> prepare -> Prepared
//! ```
//!
//! Any stage may fail, which moves the request to `Failed` and aborts the
//! pipeline for that resource only. `prepare` is never called after a failed
//! `execute`.
//!
//! All stages receive the same [`ProviderContext`]: the shared API client,
//! the session cookies, the bitrate preference, the credential prompt and
//! the NetEase request signer.
//!
//! # Example
//!
//! ```no_run
//! use music_get::provider::{Bitrate, ProviderContext, resolve_tracks};
//! use music_get::router::route;
//! use music_get::session::ProviderSession;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = ProviderContext::new(ProviderSession::default(), Bitrate::Kbps320)?;
//! let mut request = route("https://www.kuwo.cn/album_detail/1234")?;
//! let tracks = resolve_tracks(request.as_mut(), &ctx).await?;
//! println!("{} tracks", tracks.len());
//! # Ok(())
//! # }
//! ```

mod batch;
mod error;
mod http;
pub mod kugou;
pub mod kuwo;
pub mod migu;
pub mod netease;
pub mod qq;

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use batch::resolve_in_batches;
pub use error::{ApiError, AuthError, RequestError};
pub use http::{API_TIMEOUT_SECS, ApiClient};
pub use netease::crypto::{PassthroughSigner, RequestSignature, RequestSigner, WeapiSigner};

use crate::session::{ProviderSession, StoredCookie, unix_now};
use crate::track::{Provider, ResourceKind, TrackDescriptor};

/// Download bitrate preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bitrate {
    #[default]
    Kbps128,
    Kbps192,
    Kbps320,
    /// Highest quality the platform offers.
    Highest,
}

impl Bitrate {
    /// Maps a kbps value; anything other than 128/192/320 means highest.
    #[must_use]
    pub fn from_kbps(kbps: u32) -> Self {
        match kbps {
            128 => Self::Kbps128,
            192 => Self::Kbps192,
            320 => Self::Kbps320,
            _ => Self::Highest,
        }
    }

    /// Nominal kbps, `None` for [`Bitrate::Highest`].
    #[must_use]
    pub fn kbps(self) -> Option<u32> {
        match self {
            Self::Kbps128 => Some(128),
            Self::Kbps192 => Some(192),
            Self::Kbps320 => Some(320),
            Self::Highest => None,
        }
    }
}

/// Account credentials for a provider login.
#[derive(Clone)]
pub struct Credentials {
    pub account: String,
    password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
        }
    }

    /// Returns the password. Never log the return value.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Source of login credentials (terminal prompt, fixed values in tests).
pub trait CredentialPrompt: Send + Sync {
    /// Asks for credentials for `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialsUnavailable`] when none can be obtained.
    fn credentials(&self, provider: Provider) -> Result<Credentials, AuthError>;
}

/// Prompt that never yields credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialPrompt for NoCredentials {
    fn credentials(&self, provider: Provider) -> Result<Credentials, AuthError> {
        Err(AuthError::CredentialsUnavailable { provider })
    }
}

/// Prompt that always yields the same credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialPrompt for StaticCredentials {
    fn credentials(&self, _provider: Provider) -> Result<Credentials, AuthError> {
        Ok(self.0.clone())
    }
}

/// Explicit context threaded through every provider request.
pub struct ProviderContext {
    client: ApiClient,
    session: RwLock<ProviderSession>,
    bitrate: Bitrate,
    prompt: Box<dyn CredentialPrompt>,
    signer: Arc<dyn RequestSigner>,
    api_base: Option<Url>,
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("bitrate", &self.bitrate)
            .field("signer", &self.signer)
            .field("api_base", &self.api_base.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl ProviderContext {
    /// Creates a context with the weapi signer and no credential prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpRequest`] if the HTTP client cannot be built.
    pub fn new(session: ProviderSession, bitrate: Bitrate) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new()?,
            session: RwLock::new(session),
            bitrate,
            prompt: Box::new(NoCredentials),
            signer: Arc::new(WeapiSigner),
            api_base: None,
        })
    }

    /// Replaces the credential prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl CredentialPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// Replaces the NetEase request signer.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Redirects every provider endpoint to `base` (scheme, host and port).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpRequest`] if `base` is not a valid URL.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, ApiError> {
        let url = Url::parse(base).map_err(|e| ApiError::invalid_request(base, e))?;
        self.api_base = Some(url);
        Ok(self)
    }

    #[must_use]
    pub fn bitrate(&self) -> Bitrate {
        self.bitrate
    }

    #[must_use]
    pub fn signer(&self) -> &dyn RequestSigner {
        self.signer.as_ref()
    }

    /// Asks the prompt for credentials.
    ///
    /// # Errors
    ///
    /// Propagates the prompt's [`AuthError`].
    pub fn credentials(&self, provider: Provider) -> Result<Credentials, AuthError> {
        self.prompt.credentials(provider)
    }

    /// Whether the session holds an unexpired cookie named `cookie_name`.
    #[must_use]
    pub fn is_authenticated(&self, cookie_name: &str) -> bool {
        self.read_session().is_authenticated(cookie_name, unix_now())
    }

    /// `Cookie` header value for a request to `url`.
    ///
    /// Cookies are matched against the host of `url` as written, before the
    /// API base override applies, so a rebased endpoint still carries the
    /// cookies of the site it stands in for.
    #[must_use]
    pub fn cookie_header(&self, url: &str) -> Option<String> {
        let host = Url::parse(url).ok()?.host_str()?.to_string();
        self.read_session().cookie_header(&host, unix_now())
    }

    /// Replaces the session cookies after a successful login.
    pub fn replace_cookies(&self, cookies: Vec<StoredCookie>) {
        self.write_session().replace_cookies(cookies);
    }

    /// Copy of the current session.
    #[must_use]
    pub fn session(&self) -> ProviderSession {
        self.read_session().clone()
    }

    /// Consumes the context, returning the session for persistence.
    #[must_use]
    pub fn into_session(self) -> ProviderSession {
        self.session
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Applies the API base override to `url`.
    #[must_use]
    pub fn endpoint(&self, url: &str) -> String {
        let Some(base) = &self.api_base else {
            return url.to_string();
        };
        let Ok(mut target) = Url::parse(url) else {
            return url.to_string();
        };
        let rebased = target.set_scheme(base.scheme()).is_ok()
            && target.set_host(base.host_str()).is_ok()
            && target.set_port(base.port()).is_ok();
        if rebased {
            target.to_string()
        } else {
            warn!(url, base = %base, "cannot rebase endpoint, using original");
            url.to_string()
        }
    }

    /// GET `url` with `query` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status or undecodable body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        provider: Provider,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.get_json_with_headers(provider, url, query, &[]).await
    }

    /// Like [`get_json`](Self::get_json) with extra request headers.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status or undecodable body.
    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        provider: Provider,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&'static str, &str)],
    ) -> Result<T, ApiError> {
        let endpoint = self.endpoint(url);
        let mut request = self.client.get(provider, &endpoint, query)?;
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = self
            .client
            .send(&endpoint, request, self.cookie_header(url).as_deref())
            .await?;
        ApiClient::decode(&endpoint, response).await
    }

    /// POST an urlencoded `form` to `url`, returning the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-2xx status.
    pub async fn post_form(
        &self,
        provider: Provider,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Response, ApiError> {
        let endpoint = self.endpoint(url);
        let request = self.client.post_form(provider, &endpoint, form);
        self.client
            .send(&endpoint, request, self.cookie_header(url).as_deref())
            .await
    }

    /// POST an urlencoded `form` to `url` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status or undecodable body.
    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        provider: Provider,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self.post_form(provider, url, form).await?;
        ApiClient::decode(&self.endpoint(url), response).await
    }

    fn read_session(&self) -> RwLockReadGuard<'_, ProviderSession> {
        self.session
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, ProviderSession> {
        self.session
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Four-stage request protocol, implemented per (provider, resource kind).
///
/// This trait uses `async_trait` so routing can hand out `Box<dyn MusicRequest>`.
#[async_trait]
pub trait MusicRequest: Send {
    fn provider(&self) -> Provider;

    fn kind(&self) -> ResourceKind;

    /// Pure check against the current session. Providers without auth return false.
    fn require_login(&self, _ctx: &ProviderContext) -> bool {
        false
    }

    /// Obtains credentials, logs in and replaces the session cookies.
    async fn login(&mut self, _ctx: &ProviderContext) -> Result<(), AuthError> {
        Ok(())
    }

    /// Issues the primary metadata request(s) and validates the response status.
    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError>;

    /// Turns the decoded response into track descriptors.
    ///
    /// May issue secondary requests: song detail lookups, batched resolution
    /// and per-song playback URL lookups.
    async fn prepare(&mut self, ctx: &ProviderContext)
    -> Result<Vec<TrackDescriptor>, ApiError>;
}

/// Lifecycle stage of a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Created,
    NotAuthenticated,
    Authenticated,
    Executed,
    Prepared,
    Failed,
}

fn advance(from: RequestStage, to: RequestStage) -> RequestStage {
    debug!(?from, ?to, "request stage transition");
    to
}

/// Drives a request through its stages and returns its track descriptors.
///
/// # Errors
///
/// Returns [`RequestError::Auth`] when login fails and [`RequestError::Api`]
/// when `execute` or `prepare` fails. Either aborts this resource only.
#[instrument(skip_all, fields(provider = %request.provider(), kind = %request.kind()))]
pub async fn resolve_tracks(
    request: &mut dyn MusicRequest,
    ctx: &ProviderContext,
) -> Result<Vec<TrackDescriptor>, RequestError> {
    let mut stage = RequestStage::Created;

    if request.require_login(ctx) {
        stage = advance(stage, RequestStage::NotAuthenticated);
        info!("login required");
        if let Err(e) = request.login(ctx).await {
            advance(stage, RequestStage::Failed);
            return Err(e.into());
        }
        stage = advance(stage, RequestStage::Authenticated);
    }

    if let Err(e) = request.execute(ctx).await {
        advance(stage, RequestStage::Failed);
        return Err(e.into());
    }
    stage = advance(stage, RequestStage::Executed);

    match request.prepare(ctx).await {
        Ok(tracks) => {
            advance(stage, RequestStage::Prepared);
            info!(tracks = tracks.len(), "resource resolved");
            Ok(tracks)
        }
        Err(e) => {
            advance(stage, RequestStage::Failed);
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<&'static str>>>,
        needs_login: bool,
        fail_login: bool,
        fail_execute: bool,
    }

    #[async_trait]
    impl MusicRequest for Recorder {
        fn provider(&self) -> Provider {
            Provider::NetEase
        }

        fn kind(&self) -> ResourceKind {
            ResourceKind::Song
        }

        fn require_login(&self, _ctx: &ProviderContext) -> bool {
            self.calls.lock().unwrap().push("require_login");
            self.needs_login
        }

        async fn login(&mut self, _ctx: &ProviderContext) -> Result<(), AuthError> {
            self.calls.lock().unwrap().push("login");
            if self.fail_login {
                Err(AuthError::CredentialsUnavailable {
                    provider: Provider::NetEase,
                })
            } else {
                Ok(())
            }
        }

        async fn execute(&mut self, _ctx: &ProviderContext) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push("execute");
            if self.fail_execute {
                Err(ApiError::status("e", 400, "bad"))
            } else {
                Ok(())
            }
        }

        async fn prepare(
            &mut self,
            _ctx: &ProviderContext,
        ) -> Result<Vec<TrackDescriptor>, ApiError> {
            self.calls.lock().unwrap().push("prepare");
            Ok(vec![TrackDescriptor::new(Provider::NetEase, "a.mp3", ".")])
        }
    }

    fn ctx() -> ProviderContext {
        ProviderContext::new(ProviderSession::default(), Bitrate::default()).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_without_login() {
        let mut request = Recorder::default();
        let calls = Arc::clone(&request.calls);
        let tracks = resolve_tracks(&mut request, &ctx()).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["require_login", "execute", "prepare"]
        );
    }

    #[tokio::test]
    async fn test_resolve_logs_in_before_execute() {
        let mut request = Recorder {
            needs_login: true,
            ..Recorder::default()
        };
        let calls = Arc::clone(&request.calls);
        resolve_tracks(&mut request, &ctx()).await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["require_login", "login", "execute", "prepare"]
        );
    }

    #[tokio::test]
    async fn test_failed_login_skips_execute() {
        let mut request = Recorder {
            needs_login: true,
            fail_login: true,
            ..Recorder::default()
        };
        let calls = Arc::clone(&request.calls);
        let err = resolve_tracks(&mut request, &ctx()).await.unwrap_err();
        assert!(matches!(err, RequestError::Auth(_)));
        assert_eq!(*calls.lock().unwrap(), vec!["require_login", "login"]);
    }

    #[tokio::test]
    async fn test_failed_execute_skips_prepare() {
        let mut request = Recorder {
            fail_execute: true,
            ..Recorder::default()
        };
        let calls = Arc::clone(&request.calls);
        let err = resolve_tracks(&mut request, &ctx()).await.unwrap_err();
        assert!(matches!(err, RequestError::Api(_)));
        assert_eq!(*calls.lock().unwrap(), vec!["require_login", "execute"]);
    }

    #[test]
    fn test_bitrate_from_kbps() {
        assert_eq!(Bitrate::from_kbps(128), Bitrate::Kbps128);
        assert_eq!(Bitrate::from_kbps(320).kbps(), Some(320));
        assert_eq!(Bitrate::from_kbps(999), Bitrate::Highest);
        assert_eq!(Bitrate::Highest.kbps(), None);
    }

    #[test]
    fn test_endpoint_rebases_onto_api_base() {
        let ctx = ctx().with_api_base("http://127.0.0.1:4321").unwrap();
        assert_eq!(
            ctx.endpoint("https://music.163.com/weapi/v3/song/detail?x=1"),
            "http://127.0.0.1:4321/weapi/v3/song/detail?x=1"
        );
    }

    #[test]
    fn test_endpoint_without_override_is_unchanged() {
        assert_eq!(
            ctx().endpoint("https://y.qq.com/a"),
            "https://y.qq.com/a"
        );
    }

    #[test]
    fn test_replace_cookies_updates_authentication() {
        let ctx = ctx();
        assert!(!ctx.is_authenticated("MUSIC_U"));
        ctx.replace_cookies(vec![StoredCookie::new(
            "MUSIC_U",
            "v",
            ".music.163.com",
            unix_now() + 3600,
        )]);
        assert!(ctx.is_authenticated("MUSIC_U"));
        assert!(
            ctx.cookie_header("https://music.163.com/weapi/v3/song/detail")
                .unwrap()
                .starts_with("MUSIC_U=")
        );
        assert_eq!(ctx.cookie_header("http://www.kuwo.cn/api/www/music"), None);
        assert_eq!(ctx.cookie_header("not a url"), None);
        assert_eq!(ctx.into_session().cookies().len(), 1);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("13800000000", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert_eq!(creds.password(), "hunter2");
    }

    #[test]
    fn test_no_credentials_prompt_fails() {
        assert!(NoCredentials.credentials(Provider::NetEase).is_err());
    }
}
