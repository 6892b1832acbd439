use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{FailureKind, ServiceError};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// Whole-request cap for JSON calls.
    pub request_timeout: Duration,
    /// Longest silence tolerated while streaming a file body. Transfers have
    /// no overall cap, so large files on slow links still complete.
    pub transfer_read_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            transfer_read_timeout: Duration::from_secs(60),
        }
    }
}

/// Client for small JSON request/response calls.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))
}

/// Client for object uploads and deck downloads.
pub fn build_transfer_client(settings: &HttpSettings) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .read_timeout(settings.transfer_read_timeout)
        .build()
        .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))
}

/// Parses a base URL so that relative endpoints join underneath its path.
pub(crate) fn parse_base(raw: &str) -> Result<reqwest::Url, ServiceError> {
    let mut base = reqwest::Url::parse(raw)
        .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, format!("{raw}: {err}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

pub(crate) fn join(base: &reqwest::Url, endpoint: &str) -> Result<reqwest::Url, ServiceError> {
    base.join(endpoint)
        .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, err.to_string()))
}

pub(crate) fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ServiceError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ))
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let response = ensure_success(response)?;
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body)
        .map_err(|err| ServiceError::new(FailureKind::Decode, err.to_string()))
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ServiceError::new(FailureKind::Decode, err.to_string());
    }
    ServiceError::new(FailureKind::Network, err.to_string())
}
