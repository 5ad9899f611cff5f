use link_logging::{link_debug, link_info};
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, USER_AGENT};
use serde_json::Value;
use sheetlink_core::{
    share_token, FailureKind, LinkError, PingReport, ResolutionResult, ResolvedVia, Strategy,
};
use url::Url;

use crate::client::{body_snippet, build_client, header_string, map_reqwest_error, read_capped};
use crate::config::ResolverSettings;
use crate::resolve::LinkResolver;

const DOWNLOAD_URL_KEYS: [&str; 2] = ["@content.downloadUrl", "@microsoft.graph.downloadUrl"];
const PING_UA: &str = "Mozilla/5.0";

/// Resolves through the OneDrive `shares` API instead of walking redirects.
pub struct ShareTokenResolver {
    settings: ResolverSettings,
}

impl ShareTokenResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn metadata_url(&self, share_url: &str) -> String {
        format!("{}/shares/{}/root", self.api_base(), share_token(share_url.trim()))
    }

    pub fn content_url(&self, share_url: &str) -> String {
        format!(
            "{}/shares/{}/root/content",
            self.api_base(),
            share_token(share_url.trim())
        )
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.trim_end_matches('/')
    }

    /// Requests the content endpoint without following redirects. A redirect or
    /// a 2xx means the link is anonymously readable.
    pub async fn ping(&self, share_url: &str) -> Result<PingReport, LinkError> {
        ensure_http_url(share_url)?;
        let content_url = self.content_url(share_url);
        let client = build_client(
            self.settings.connect_timeout(),
            self.settings.request_timeout(),
            reqwest::redirect::Policy::none(),
        )?;
        let response = client
            .get(content_url.as_str())
            .header(USER_AGENT, PING_UA)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|err| map_reqwest_error(err).with_visited(&[content_url.clone()]))?;

        let status = response.status();
        let location = header_string(&response, LOCATION);
        let location_host = location.as_deref().and_then(|loc| {
            Url::parse(&content_url)
                .ok()
                .and_then(|base| base.join(loc).ok())
                .and_then(|url| url.host_str().map(str::to_string))
        });
        let content_type = header_string(&response, CONTENT_TYPE);
        let content_length = header_string(&response, CONTENT_LENGTH);
        let note = if status.is_redirection() {
            "redirect received: access is granted and the content lives at the Location host"
        } else if status.is_success() {
            "content served directly"
        } else {
            "4xx/5xx usually means a permission or link-type problem"
        };
        let body_snippet = if status.is_success() || status.is_redirection() {
            None
        } else {
            body_snippet(response).await
        };

        link_info!("ping {} -> {}", content_url, status.as_u16());
        Ok(PingReport {
            http_status: status.as_u16(),
            has_location: location.is_some(),
            location_host,
            content_type,
            content_length,
            note: note.to_string(),
            body_snippet,
        })
    }
}

#[async_trait::async_trait]
impl LinkResolver for ShareTokenResolver {
    fn strategy(&self) -> Strategy {
        Strategy::ShareTokenApi
    }

    async fn resolve(&self, share_url: &str) -> Result<ResolutionResult, LinkError> {
        ensure_http_url(share_url)?;
        let metadata_url = self.metadata_url(share_url);
        let visited = vec![metadata_url.clone()];
        let metadata_failed = |message: String| {
            LinkError::new(FailureKind::MetadataFetchFailed, message).with_visited(&visited)
        };

        let client = build_client(
            self.settings.connect_timeout(),
            self.settings.request_timeout(),
            reqwest::redirect::Policy::limited(self.settings.max_hops),
        )?;
        link_debug!("GET share metadata {}", metadata_url);
        let response = client
            .get(metadata_url.as_str())
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| metadata_failed(map_reqwest_error(err).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let snippet = body_snippet(response).await;
            return Err(
                metadata_failed(format!("metadata endpoint answered {}", status.as_u16()))
                    .with_body_snippet(snippet),
            );
        }
        let response_type = header_string(&response, CONTENT_TYPE);

        let bytes = read_capped(response, self.settings.max_html_bytes)
            .await
            .map_err(|err| metadata_failed(err.to_string()))?;
        let metadata: Value = serde_json::from_slice(&bytes)
            .map_err(|err| metadata_failed(format!("metadata is not JSON: {err}")))?;

        let download_url = DOWNLOAD_URL_KEYS
            .iter()
            .find_map(|key| metadata.get(*key).and_then(Value::as_str))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                LinkError::new(
                    FailureKind::DownloadUrlMissing,
                    "share metadata carries no download url",
                )
                .with_visited(&visited)
            })?;

        let content_type = metadata
            .get("file")
            .and_then(|file| file.get("mimeType"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(response_type);

        link_info!("resolved {} via share token API", share_url);
        Ok(ResolutionResult {
            terminal_url: download_url.to_string(),
            visited,
            http_status: status.as_u16(),
            resolved_via: Some(ResolvedVia::ApiShareToken),
            content_type,
        })
    }
}

fn ensure_http_url(raw: &str) -> Result<(), LinkError> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(LinkError::new(
            FailureKind::InvalidUrl,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(err) => Err(LinkError::new(FailureKind::InvalidUrl, err.to_string())),
    }
}
