//! Plumbing shared by every upstream client: client construction, status
//! checks with body excerpts, and the transient/permanent split that drives
//! retries.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};
use tracing::warn;
use trendpost_util_fmt::excerpt;

use crate::LOG_TARGET;

/// How much of an error response body ends up in diagnostics.
pub const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    #[snafu(display("Failed to build HTTP client"))]
    Build { source: reqwest::Error },
    #[snafu(display("Request to {url} failed"))]
    Transport { url: String, source: reqwest::Error },
    #[snafu(display("{url} responded with {status}: {body}"))]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[snafu(display("Unexpected response body from {url}"))]
    Decode { url: String, source: reqwest::Error },
}

pub type HttpResult<T> = std::result::Result<T, HttpError>;

impl HttpError {
    /// Whether trying the same request again may succeed.
    ///
    /// Transport problems (other than requests that could not even be
    /// built), gateway/server errors (including CDN-specific 5xx
    /// codes such as 530) and rate limiting are transient. Other statuses are
    /// answers, not accidents.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Build { .. } => false,
            // A malformed URL fails the same way every time.
            HttpError::Transport { source, .. } => !source.is_builder(),
            HttpError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            HttpError::Decode { source, .. } => source.is_timeout(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            HttpError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> HttpResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context(BuildSnafu)
}

/// Pass successful responses through, turn anything else into
/// [`HttpError::Status`] carrying a body excerpt.
pub(crate) async fn ensure_success(url: &str, response: Response) -> HttpResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = excerpt(body.trim(), BODY_EXCERPT_CHARS);
    warn!(target: LOG_TARGET, %url, %status, %body, "Upstream returned an error status");

    StatusSnafu { url, status, body }.fail()
}

pub(crate) async fn read_json<T>(url: &str, response: Response) -> HttpResult<T>
where
    T: DeserializeOwned,
{
    response.json().await.context(DecodeSnafu { url })
}

pub(crate) async fn read_text(url: &str, response: Response) -> HttpResult<String> {
    response.text().await.context(DecodeSnafu { url })
}
