//! HTTP client wrapper for media downloads.
//!
//! [`HttpClient`] sends the media GET with the provider's site headers and
//! session cookies; [`stream_to_file`] copies the body to disk chunk by chunk
//! and verifies the declared length.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{COOKIE, ORIGIN, REFERER};
use reqwest::{Client, ClientBuilder, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use url::Url;

use super::error::DownloadError;
use crate::track::Provider;
use crate::user_agent;

/// Connection establishment timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall timeout of one media request, body included.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// HTTP client for streaming media files.
///
/// Created once per engine and shared by every task, so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, request_timeout_secs: u64) -> Self {
        let client = base_client_builder(connect_timeout_secs, request_timeout_secs)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends the media GET for `url`.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] when `url` does not parse
    /// - [`DownloadError::Timeout`] / [`DownloadError::Network`] on transport failure
    /// - [`DownloadError::AuthRequired`] on 401 or 403
    /// - [`DownloadError::HttpStatus`] on any other non-2xx status
    pub async fn get(
        &self,
        url: &str,
        provider: Provider,
        cookie_header: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let mut request = self
            .client
            .get(parsed)
            .header(ORIGIN, provider.origin())
            .header(REFERER, provider.referer());
        if let Some(cookie) = cookie_header {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "media response");
        if !status.is_success() {
            let status_code = status.as_u16();
            if matches!(status_code, 401 | 403) {
                return Err(DownloadError::auth_required(url, status_code));
            }
            return Err(DownloadError::http_status(url, status_code));
        }
        Ok(response)
    }
}

/// Streams the response body into `file`, returning bytes written.
///
/// The byte count must match the declared `Content-Length` when the server
/// sent one. Partially written files are left for the caller to clean up.
///
/// # Errors
///
/// Returns [`DownloadError::Network`] or [`DownloadError::Timeout`] when the
/// body stream fails, [`DownloadError::Io`] when a write fails and
/// [`DownloadError::Integrity`] on a length mismatch.
pub(crate) async fn stream_to_file(
    file: File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let expected = response.content_length();
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    check_length(file_path, expected, bytes_written)?;
    Ok(bytes_written)
}

fn check_length(
    file_path: &Path,
    expected: Option<u64>,
    bytes_written: u64,
) -> Result<(), DownloadError> {
    match expected {
        Some(expected) if expected != bytes_written => Err(DownloadError::integrity(
            file_path,
            expected,
            bytes_written,
        )),
        _ => Ok(()),
    }
}

fn base_client_builder(connect_timeout_secs: u64, request_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::browser_user_agent())
}
