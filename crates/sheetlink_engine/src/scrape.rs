use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use sheetlink_core::{host_matches, ScrapeSource, ScrapedLink, ShareReference};
use url::Url;

const STATIC_ASSET_SUFFIXES: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".map",
];

/// Finds URLs worth following inside an HTML page.
pub trait LinkScraper: Send + Sync {
    /// All candidates in priority order, absolute and de-duplicated.
    fn candidates(&self, html: &str, base: &Url) -> Vec<ScrapedLink>;

    fn extract_candidate_url(&self, html: &str, base: &Url) -> Option<Url> {
        self.candidates(html, base).into_iter().next().map(|link| link.url)
    }
}

/// Heuristics for OneDrive/SharePoint landing pages:
/// 1. `<meta http-equiv="refresh">` targets
/// 2. `location = "..."` / `location.replace("...")` in scripts
/// 3. direct download URLs (`/download`, `download.aspx`, `download=1`), never static assets
/// 4. embed URLs carrying `resid` and `authkey`
/// 5. any other URL on a provider host (or the page's own host).
#[derive(Debug, Clone)]
pub struct ProviderLinkScraper {
    provider_domains: Vec<String>,
}

impl ProviderLinkScraper {
    pub fn new(provider_domains: Vec<String>) -> Self {
        Self { provider_domains }
    }

    fn is_provider(&self, url: &Url, base: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        base.host_str()
            .is_some_and(|base_host| base_host.eq_ignore_ascii_case(host))
            || host_matches(host, &self.provider_domains)
    }
}

impl LinkScraper for ProviderLinkScraper {
    fn candidates(&self, html: &str, base: &Url) -> Vec<ScrapedLink> {
        let mut found = Candidates::default();
        let doc = Html::parse_document(html);

        for target in meta_refresh_targets(&doc) {
            found.push(resolve_reference(&target, base), ScrapeSource::MetaRefresh);
        }

        let text = unescape_embedded(html);
        for caps in script_location_re().captures_iter(&text) {
            if let Some(target) = caps.get(1).or_else(|| caps.get(2)) {
                found.push(resolve_reference(target.as_str(), base), ScrapeSource::ScriptRedirect);
            }
        }

        let mut urls: Vec<Url> = absolute_url_re()
            .find_iter(&text)
            .filter_map(|m| Url::parse(trim_trailing_punctuation(m.as_str())).ok())
            .collect();
        urls.extend(
            element_references(&doc)
                .iter()
                .filter_map(|raw| resolve_reference(raw, base)),
        );
        urls.retain(|url| matches!(url.scheme(), "http" | "https"));

        for url in urls
            .iter()
            .filter(|url| is_direct_download(url) && !is_static_asset(url))
        {
            found.push(Some(url.clone()), ScrapeSource::DirectDownload);
        }
        for url in urls.iter().filter(|url| is_embed_reference(url)) {
            found.push(Some(url.clone()), ScrapeSource::EmbedReference);
        }
        for url in urls
            .iter()
            .filter(|url| self.is_provider(url, base) && !is_static_asset(url))
        {
            found.push(Some(url.clone()), ScrapeSource::ProviderLink);
        }

        found.links
    }
}

#[derive(Default)]
struct Candidates {
    links: Vec<ScrapedLink>,
}

impl Candidates {
    fn push(&mut self, url: Option<Url>, source: ScrapeSource) {
        let Some(mut url) = url else {
            return;
        };
        url.set_fragment(None);
        if self.links.iter().any(|link| link.url == url) {
            return;
        }
        self.links.push(ScrapedLink { url, source });
    }
}

fn meta_refresh_targets(doc: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("meta[http-equiv]") else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter(|meta| {
            meta.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .filter_map(refresh_target)
        .collect()
}

/// `"0; URL='https://..'"` -> `https://..`
fn refresh_target(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    let start = lower.find("url=")? + "url=".len();
    let target = content[start..].trim().trim_matches(['"', '\'']).trim();
    (!target.is_empty()).then(|| target.to_string())
}

fn element_references(doc: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href], iframe[src]") else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter_map(|el| el.value().attr("href").or_else(|| el.value().attr("src")))
        .map(|raw| raw.trim().to_string())
        .collect()
}

fn resolve_reference(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    let lower = trimmed.to_ascii_lowercase();
    if trimmed.is_empty()
        || lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
    {
        return None;
    }
    Url::parse(trimmed).or_else(|_| base.join(trimmed)).ok()
}

/// Undoes the JSON and entity escaping that script blocks put around URLs.
fn unescape_embedded(html: &str) -> String {
    html.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\u003d", "=")
        .replace("\\u003D", "=")
        .replace("&amp;", "&")
}

fn trim_trailing_punctuation(raw: &str) -> &str {
    raw.trim_end_matches(['.', ',', ';', ':', '!'])
}

/// `/download`, `/download.aspx` (any segment, any case) or `?download=1`.
fn is_direct_download(url: &Url) -> bool {
    let download_segment = url.path_segments().is_some_and(|mut segments| {
        segments.any(|segment| {
            segment.eq_ignore_ascii_case("download")
                || segment.eq_ignore_ascii_case("download.aspx")
        })
    });
    download_segment
        || url
            .query_pairs()
            .any(|(k, v)| k.eq_ignore_ascii_case("download") && v == "1")
}

fn is_embed_reference(url: &Url) -> bool {
    url.path().to_ascii_lowercase().contains("embed") && ShareReference::from_url(url).is_some()
}

fn is_static_asset(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    STATIC_ASSET_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

fn script_location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:(?:window|document|top|self)\.)?location(?:\.href)?\s*=\s*["']([^"']+)["']|location\.(?:replace|assign)\(\s*["']([^"']+)["']"#,
        )
        .expect("valid script location regex")
    })
}

fn absolute_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'<>()\\]+"#).expect("valid absolute url regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_target_accepts_quoted_and_bare_forms() {
        assert_eq!(
            refresh_target("0; URL='https://x.test/a'").as_deref(),
            Some("https://x.test/a")
        );
        assert_eq!(refresh_target("5;url=/next").as_deref(), Some("/next"));
        assert_eq!(refresh_target("5"), None);
    }

    #[test]
    fn download_shape_is_a_path_segment_or_query_flag() {
        let yes = |raw: &str| is_direct_download(&Url::parse(raw).unwrap());
        assert!(yes("https://onedrive.live.com/download?resid=A&authkey=B"));
        assert!(yes("https://contoso.sharepoint.com/_layouts/15/Download.aspx?UniqueId=1"));
        assert!(yes("https://files.example.test/book.xlsx?download=1"));
        assert!(!yes("https://onedrive.live.com/assets/download-helper.js"));
        assert!(!yes("https://onedrive.live.com/downloads/list"));
    }

    #[test]
    fn escaped_script_urls_are_unescaped() {
        let text = unescape_embedded(r#"{"u":"https:\/\/a.test\/download?x=1&y=2"}"#);
        assert!(text.contains("https://a.test/download?x=1&y=2"));
    }
}
