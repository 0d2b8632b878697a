//! Conditional HTTP fetch of the remote denylist.

use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{Error, Result};

/// Revalidation tokens of a stored payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    /// `ETag` response header.
    pub etag: Option<String>,
    /// `Last-Modified` response header.
    pub last_modified: Option<String>,
}

impl Validators {
    /// Whether there is nothing to revalidate with.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string)
        };
        Self {
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
        }
    }
}

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Server confirmed the stored payload is current (304).
    NotModified,
    /// New payload (a JSON object) with its revalidation tokens.
    Fetched {
        /// Parsed payload.
        body: Value,
        /// Tokens to store alongside it.
        validators: Validators,
    },
}

/// HTTP client for the remote denylist.
#[derive(Debug, Clone)]
pub struct DenylistClient {
    http_client: reqwest::Client,
    url: Url,
}

impl DenylistClient {
    /// Creates a client for the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            http_client: reqwest::Client::new(),
            url: Url::parse(url)?,
        })
    }

    /// Uses a preconfigured HTTP client (timeouts, user agent).
    #[must_use]
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Denylist URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the denylist, sending `If-None-Match`/`If-Modified-Since` when
    /// tokens are available.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the request fails
    /// - [`Error::HttpStatus`] for any status other than success or 304
    /// - [`Error::Json`] / [`Error::InvalidPayload`] if the body is not a JSON object
    pub async fn fetch(&self, validators: &Validators) -> Result<FetchOutcome> {
        let mut request = self.http_client.get(self.url.clone());
        if let Some(etag) = &validators.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &validators.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(url = %self.url, %status, "Denylist response");

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let validators = Validators::from_headers(response.headers());
        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        if !body.is_object() {
            return Err(Error::InvalidPayload(
                "denylist payload is not a JSON object".to_string(),
            ));
        }

        Ok(FetchOutcome::Fetched { body, validators })
    }
}
