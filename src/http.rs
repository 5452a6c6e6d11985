// Shared HTTP plumbing for the Eve-Scout, ESI and Discord clients.

use crate::settings::Api;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Builds a client with the configured timeout and user agent.
///
/// Every outbound call in the crate goes through a client built here, so no request
/// can hang a poll cycle.
pub fn build_client(api: &Api) -> Result<reqwest::Client, ClientError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(api.request_timeout_ms))
        .user_agent(api.user_agent.clone())
        .build()?;
    Ok(client)
}
