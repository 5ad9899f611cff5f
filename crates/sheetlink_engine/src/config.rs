use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheetlink_core::{ChainPolicy, Strategy};
use thiserror::Error;
use url::Url;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fragments that mark a share URL nobody filled in.
const PLACEHOLDER_MARKERS: &[&str] = &["PASTE", "YOUR_", "YOUR-", "REPLACE", "CHANGE_ME", "<", ">"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("share_url is not a valid http(s) url: {0}")]
    InvalidShareUrl(String),
    #[error("share_url still holds a placeholder: {0}")]
    PlaceholderShareUrl(String),
    #[error("api_base is not a valid http(s) url: {0}")]
    InvalidApiBase(String),
    #[error("at least one resolution strategy is required")]
    NoStrategies,
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Settings for walking a share link down to its terminal URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub max_hops: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub login_domains: Vec<String>,
    pub provider_domains: Vec<String>,
    pub html_content_types: Vec<String>,
    pub max_html_bytes: u64,
    pub api_base: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_hops: 12,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 20_000,
            user_agent: BROWSER_UA.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            login_domains: ChainPolicy::default().login_domains,
            provider_domains: vec![
                "onedrive.live.com".to_string(),
                "1drv.ms".to_string(),
                "onedrive.com".to_string(),
                "sharepoint.com".to_string(),
                "livefilestore.com".to_string(),
                "live.net".to_string(),
            ],
            html_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            max_html_bytes: 2 * 1024 * 1024,
            api_base: "https://api.onedrive.com/v1.0".to_string(),
        }
    }
}

impl ResolverSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn chain_policy(&self) -> ChainPolicy {
        ChainPolicy {
            max_hops: self.max_hops,
            login_domains: self.login_domains.clone(),
        }
    }

    /// Compares the media type only, ignoring parameters such as charset.
    pub fn is_html(&self, content_type: Option<&str>) -> bool {
        content_type.is_some_and(|ct| is_content_type_in(ct, &self.html_content_types))
    }
}

/// Settings for the final, redirect-following download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 60_000,
            redirect_limit: 10,
            max_bytes: 25 * 1024 * 1024,
            user_agent: BROWSER_UA.to_string(),
        }
    }
}

impl DownloadSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Everything an invocation needs, passed in explicitly and validated once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Used when an invocation carries no `url`.
    pub share_url: Option<String>,
    /// Sheet to parse; the first sheet when unset.
    pub sheet_name: Option<String>,
    /// Columns kept in parsed rows, in this order. Empty keeps all columns.
    pub fields: Vec<String>,
    pub strategies: Vec<Strategy>,
    pub resolver: ResolverSettings,
    pub download: DownloadSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            share_url: None,
            sheet_name: None,
            fields: Vec::new(),
            strategies: vec![Strategy::RedirectChain, Strategy::ShareTokenApi],
            resolver: ResolverSettings::default(),
            download: DownloadSettings::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(share_url) = self.share_url.as_deref() {
            let upper = share_url.to_ascii_uppercase();
            if PLACEHOLDER_MARKERS.iter().any(|marker| upper.contains(marker)) {
                return Err(ConfigError::PlaceholderShareUrl(share_url.to_string()));
            }
            if !is_http_url(share_url) {
                return Err(ConfigError::InvalidShareUrl(share_url.to_string()));
            }
        }
        if !is_http_url(&self.resolver.api_base) {
            return Err(ConfigError::InvalidApiBase(self.resolver.api_base.clone()));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        if self.resolver.max_hops == 0 {
            return Err(ConfigError::Zero { field: "resolver.max_hops" });
        }
        if self.resolver.max_html_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "resolver.max_html_bytes",
            });
        }
        if self.download.max_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "download.max_bytes",
            });
        }
        Ok(())
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

pub(crate) fn is_content_type_in(content_type: &str, allowed: &[String]) -> bool {
    let ct = content_type.split(';').next().unwrap_or(content_type).trim();
    allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(ct))
}
