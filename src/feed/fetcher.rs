use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while retrieving the raw feed document.
///
/// All of these are recoverable: the source is retried naturally at its next
/// scheduled interval, never inside this component.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
}

/// Fetch the raw feed document for one source.
///
/// Performs a single GET with an identifying User-Agent; redirects are
/// followed by the client's default policy. The timeout covers the request
/// and the body read independently.
pub async fn fetch_feed(
    client: &reqwest::Client,
    feed_url: &str,
    timeout: Duration,
    user_agent: &str,
) -> Result<String, FetchError> {
    let response = tokio::time::timeout(
        timeout,
        client
            .get(feed_url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send(),
    )
    .await
    .map_err(|_| FetchError::Timeout)?
    .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let body = tokio::time::timeout(timeout, response.text())
        .await
        .map_err(|_| FetchError::Timeout)??;

    Ok(body)
}
