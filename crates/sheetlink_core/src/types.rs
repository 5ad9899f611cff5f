use serde::{Deserialize, Serialize};
use url::Url;

/// One worksheet row: column header to cell value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// How the terminal URL of a resolution was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedVia {
    Redirect,
    UrlParams,
    HtmlRegex,
    HtmlEmbedUrl,
    ApiShareToken,
}

/// Resolution strategies, attempted in configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    RedirectChain,
    ShareTokenApi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    #[serde(rename = "finalUrl")]
    pub terminal_url: String,
    pub visited: Vec<String>,
    pub http_status: u16,
    pub resolved_via: Option<ResolvedVia>,
    pub content_type: Option<String>,
}

impl ResolutionResult {
    pub fn terminal_host(&self) -> Option<String> {
        Url::parse(&self.terminal_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    }
}

/// Which scraping heuristic produced a candidate URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeSource {
    MetaRefresh,
    ScriptRedirect,
    DirectDownload,
    EmbedReference,
    ProviderLink,
}

impl ScrapeSource {
    pub fn resolved_via(self) -> ResolvedVia {
        match self {
            ScrapeSource::EmbedReference => ResolvedVia::HtmlEmbedUrl,
            _ => ResolvedVia::HtmlRegex,
        }
    }
}

/// A URL found inside an HTML body, absolute and ready to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedLink {
    pub url: Url,
    pub source: ScrapeSource,
}
