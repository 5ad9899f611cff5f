use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use link_logging::{link_debug, link_info};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use sheetlink_core::{FailureKind, LinkError};

use crate::client::{body_snippet, build_client, header_string, map_reqwest_error, read_capped, snippet_of};
use crate::config::{is_content_type_in, DownloadSettings};

/// Raw workbook bytes plus what the server said about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub final_url: String,
    pub http_status: u16,
    pub content_type: Option<String>,
    pub redirect_count: usize,
    pub bytes: Vec<u8>,
}

impl DownloadedFile {
    /// Hex of the first `n` bytes; `504b0304` marks a zip-based xlsx.
    pub fn first_bytes_hex(&self, n: usize) -> String {
        hex::encode(&self.bytes[..self.bytes.len().min(n)])
    }
}

#[derive(Debug, Clone)]
pub struct Downloader {
    settings: DownloadSettings,
    html_content_types: Vec<String>,
}

impl Downloader {
    pub fn new(settings: DownloadSettings, html_content_types: Vec<String>) -> Self {
        Self {
            settings,
            html_content_types,
        }
    }

    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> Result<reqwest::Client, LinkError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });
        build_client(
            self.settings.connect_timeout(),
            self.settings.request_timeout(),
            policy,
        )
    }

    /// GETs `url` following redirects and buffers the whole body.
    pub async fn download(&self, url: &str) -> Result<DownloadedFile, LinkError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| LinkError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        link_debug!("download GET {}", parsed);
        let response = client
            .get(parsed)
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|err| {
                if err.is_redirect() {
                    LinkError::new(
                        FailureKind::TooManyRedirects {
                            max_hops: self.settings.redirect_limit,
                        },
                        err.to_string(),
                    )
                } else {
                    map_reqwest_error(err)
                }
            })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = header_string(&response, CONTENT_TYPE);
        if !status.is_success() {
            let snippet = body_snippet(response).await;
            return Err(LinkError::new(
                FailureKind::DownloadHttpError {
                    status: status.as_u16(),
                },
                format!("{final_url} answered {}", status.as_u16()),
            )
            .with_visited(&[final_url])
            .with_content_type(content_type)
            .with_body_snippet(snippet));
        }

        let bytes = read_capped(response, self.settings.max_bytes).await?;
        if content_type
            .as_deref()
            .is_some_and(|ct| is_content_type_in(ct, &self.html_content_types))
        {
            let snippet = snippet_of(&String::from_utf8_lossy(&bytes));
            return Err(LinkError::new(
                FailureKind::UnexpectedHtml,
                format!("{final_url} served HTML"),
            )
            .with_visited(&[final_url])
            .with_content_type(content_type)
            .with_body_snippet(Some(snippet)));
        }

        let redirect_count = redirect_counter.load(Ordering::Relaxed);
        link_info!(
            "downloaded {} bytes from {} after {} redirect(s)",
            bytes.len(),
            final_url,
            redirect_count
        );
        Ok(DownloadedFile {
            final_url,
            http_status: status.as_u16(),
            content_type,
            redirect_count,
            bytes,
        })
    }
}
