//! HTTP clients for the primary and auxiliary backends.
//!
//! Both clients share one error type and one JSON request helper. Errors
//! are mapped onto [`LoadError`] at the trait boundary:
//! - 401/403 become `AuthRequired`
//! - connection failures and timeouts become `BackendUnavailable`
//! - everything else is a `TransportFailure`

mod lcu;
mod sgp;

pub use lcu::LcuClient;
pub use sgp::SgpClient;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::backend::LoadError;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<FetchError> for LoadError {
    fn from(e: FetchError) -> Self {
        let message = e.to_string();
        match e {
            FetchError::HttpStatus { status, .. }
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                LoadError::AuthRequired(message)
            }
            FetchError::Http(ref inner) if inner.is_connect() || inner.is_timeout() => {
                LoadError::BackendUnavailable(message)
            }
            FetchError::NotConfigured(_) => LoadError::BackendUnavailable(message),
            _ => LoadError::TransportFailure(message),
        }
    }
}

/// Build a client with the given timeout.
///
/// `accept_invalid_certs` is needed for the local client, which serves a
/// self-signed certificate on localhost.
pub(crate) fn build_client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client, FetchError> {
    let client = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;
    Ok(client)
}

/// Resolve `path` against `base`.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, FetchError> {
    base.join(path)
        .map_err(|e| FetchError::InvalidUrl(format!("{}{}: {}", base, path, e)))
}

/// Send a request and decode the JSON body of a successful response.
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let body = response.bytes().await?;
    debug!("Received {} bytes", body.len());
    Ok(serde_json::from_slice(&body)?)
}
