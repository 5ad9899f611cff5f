use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::HeaderName;
use sheetlink_core::{FailureKind, LinkError};

pub(crate) const SNIPPET_CHARS: usize = 300;

pub(crate) fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
    redirect: reqwest::redirect::Policy,
) -> Result<reqwest::Client, LinkError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .redirect(redirect)
        .build()
        .map_err(|err| LinkError::new(FailureKind::Network, err.to_string()))
}

pub(crate) fn header_string(response: &reqwest::Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Buffers the body, failing once it grows past `max_bytes`.
pub(crate) async fn read_capped(
    response: reqwest::Response,
    max_bytes: u64,
) -> Result<Vec<u8>, LinkError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(LinkError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(content_len),
                },
                "response too large",
            ));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(LinkError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                },
                "response too large",
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// First characters of a response body, for error reports. Never fails.
pub(crate) async fn body_snippet(response: reqwest::Response) -> Option<String> {
    let text = response.text().await.ok()?;
    Some(snippet_of(&text))
}

pub(crate) fn snippet_of(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> LinkError {
    if err.is_timeout() {
        return LinkError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return LinkError::new(FailureKind::InvalidUrl, err.to_string());
    }
    LinkError::new(FailureKind::Network, err.to_string())
}
