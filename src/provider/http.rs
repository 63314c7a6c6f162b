//! Shared HTTP client for provider API calls.
//!
//! Every call carries the provider's `Origin`/`Referer`, the process browser
//! User-Agent and, when present, the session cookie header. Query strings and
//! urlencoded bodies are built with the `url` crate.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use url::form_urlencoded;

use super::error::ApiError;
use crate::track::Provider;
use crate::user_agent;

/// Fixed overall timeout for every API call.
pub const API_TIMEOUT_SECS: u64 = 120;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client used by provider requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    /// Creates a client with the API timeout and browser User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpRequest`] when the client cannot be built.
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::browser_user_agent())
            .build()
            .map_err(|e| ApiError::invalid_request("client", e))?;
        Ok(Self { client })
    }

    /// Builds a GET request with `query` appended to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpRequest`] when `endpoint` is not a valid URL.
    pub fn get(
        &self,
        provider: Provider,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder, ApiError> {
        let mut url =
            Url::parse(endpoint).map_err(|e| ApiError::invalid_request(endpoint, e))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(with_site_headers(self.client.get(url), provider))
    }

    /// Builds a POST request with an urlencoded `form` body.
    #[must_use]
    pub fn post_form(
        &self,
        provider: Provider,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> RequestBuilder {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        with_site_headers(self.client.post(endpoint), provider)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
    }

    /// Sends a request and checks the HTTP status.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpRequest`] on transport failure or timeout and
    /// [`ApiError::ApiResponse`] on a non-2xx status.
    pub async fn send(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        cookie_header: Option<&str>,
    ) -> Result<Response, ApiError> {
        let request = match cookie_header {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(endpoint, &e))?;

        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "api response");
        if !status.is_success() {
            return Err(ApiError::http_status(endpoint, status.as_u16()));
        }
        Ok(response)
    }

    /// Reads and decodes a JSON response body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpRequest`] if the body cannot be read and
    /// [`ApiError::ApiResponse`] if it is not the expected JSON.
    pub async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: Response,
    ) -> Result<T, ApiError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(endpoint, &e))?;
        decode_json(endpoint, &body)
    }
}

/// Decodes a JSON body, tolerating the JSONP-style wrappers some platforms emit.
pub(crate) fn decode_json<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, ApiError> {
    match serde_json::from_slice(body) {
        Ok(value) => Ok(value),
        Err(first) => {
            let text = String::from_utf8_lossy(body);
            let unwrapped = strip_jsonp(&text).ok_or_else(|| ApiError::decode(endpoint, &first))?;
            serde_json::from_str(unwrapped).map_err(|e| ApiError::decode(endpoint, &e))
        }
    }
}

fn strip_jsonp(text: &str) -> Option<&str> {
    let start = text.find('(')?;
    let end = text.rfind(')')?;
    (start < end).then(|| &text[start + 1..end])
}

fn with_site_headers(request: RequestBuilder, provider: Provider) -> RequestBuilder {
    request
        .header(ORIGIN, provider.origin())
        .header(REFERER, provider.referer())
}
