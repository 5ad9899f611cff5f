use std::sync::Arc;

use link_logging::{link_debug, link_info, link_warn};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, USER_AGENT};
use sheetlink_core::{
    update, ChainState, Effect, FailureKind, LinkError, Msg, ResolutionResult, Strategy,
};

use crate::client::{body_snippet, build_client, header_string, map_reqwest_error, read_capped};
use crate::config::ResolverSettings;
use crate::decode::decode_html_lossy;
use crate::scrape::{LinkScraper, ProviderLinkScraper};
use crate::share_api::ShareTokenResolver;

#[async_trait::async_trait]
pub trait LinkResolver: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn resolve(&self, share_url: &str) -> Result<ResolutionResult, LinkError>;
}

/// Walks the redirect chain by hand and scrapes HTML when redirects stop.
pub struct RedirectChainResolver {
    settings: ResolverSettings,
    scraper: Arc<dyn LinkScraper>,
}

impl RedirectChainResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        let scraper = Arc::new(ProviderLinkScraper::new(settings.provider_domains.clone()));
        Self { settings, scraper }
    }

    pub fn with_scraper(settings: ResolverSettings, scraper: Arc<dyn LinkScraper>) -> Self {
        Self { settings, scraper }
    }

    async fn fetch_head(
        &self,
        client: &reqwest::Client,
        url: url::Url,
    ) -> Result<(reqwest::Response, Msg), LinkError> {
        let response = client
            .get(url)
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .header(ACCEPT, self.settings.accept.as_str())
            .header(ACCEPT_LANGUAGE, self.settings.accept_language.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let content_type = header_string(&response, CONTENT_TYPE);
        let msg = Msg::HopResponse {
            status: response.status().as_u16(),
            location: header_string(&response, LOCATION),
            is_html: self.settings.is_html(content_type.as_deref()),
            content_type,
        };
        Ok((response, msg))
    }

    async fn scan_body(
        &self,
        response: reqwest::Response,
        base: &url::Url,
    ) -> Result<Msg, LinkError> {
        let content_type = header_string(&response, CONTENT_TYPE);
        let bytes = read_capped(response, self.settings.max_html_bytes).await?;
        let html = decode_html_lossy(&bytes, content_type.as_deref());
        let candidates = self.scraper.candidates(&html, base);
        link_debug!(
            "scanned {} bytes of HTML from {}: {} candidate(s)",
            bytes.len(),
            base,
            candidates.len()
        );
        Ok(Msg::BodyScanned(candidates))
    }
}

/// Keeps the content type and the start of the body of an error page.
async fn with_upstream_body(err: LinkError, response: Option<reqwest::Response>) -> LinkError {
    let Some(response) = response else {
        return err;
    };
    let content_type = header_string(&response, CONTENT_TYPE);
    let snippet = body_snippet(response).await;
    err.with_content_type(content_type).with_body_snippet(snippet)
}

#[async_trait::async_trait]
impl LinkResolver for RedirectChainResolver {
    fn strategy(&self) -> Strategy {
        Strategy::RedirectChain
    }

    async fn resolve(&self, share_url: &str) -> Result<ResolutionResult, LinkError> {
        let client = build_client(
            self.settings.connect_timeout(),
            self.settings.request_timeout(),
            reqwest::redirect::Policy::none(),
        )?;
        let (mut state, mut effect) = ChainState::start(share_url, self.settings.chain_policy())?;
        let mut last_response: Option<reqwest::Response> = None;

        loop {
            effect = match effect {
                Effect::Fetch { url } => {
                    link_debug!("hop {} GET {}", state.hops(), url);
                    let (response, msg) = self
                        .fetch_head(&client, url)
                        .await
                        .map_err(|err| err.with_visited(state.visited()))?;
                    last_response = Some(response);
                    let (next_state, next_effect) = update(state, msg);
                    state = next_state;
                    match next_effect {
                        Effect::Failed(err)
                            if matches!(err.kind, FailureKind::UpstreamHttpError { .. }) =>
                        {
                            Effect::Failed(with_upstream_body(err, last_response.take()).await)
                        }
                        other => other,
                    }
                }
                Effect::ScanBody => {
                    let Some(response) = last_response.take() else {
                        return Err(LinkError::new(
                            FailureKind::NoDownloadLinkFound,
                            "no response body to scan",
                        )
                        .with_visited(state.visited()));
                    };
                    let base = state.current().clone();
                    let msg = self
                        .scan_body(response, &base)
                        .await
                        .map_err(|err| err.with_visited(state.visited()))?;
                    let (next_state, next_effect) = update(state, msg);
                    state = next_state;
                    next_effect
                }
                Effect::Resolved(result) => {
                    link_info!(
                        "resolved {} -> {} in {} hop(s) via {:?}",
                        share_url,
                        result.terminal_url,
                        result.visited.len(),
                        result.resolved_via
                    );
                    return Ok(result);
                }
                Effect::Failed(err) => {
                    link_warn!("redirect chain for {} failed: {}", share_url, err);
                    return Err(err);
                }
            };
        }
    }
}

/// Tries each resolver in order.
pub struct FallbackResolver {
    resolvers: Vec<Box<dyn LinkResolver>>,
}

impl FallbackResolver {
    pub fn new(resolvers: Vec<Box<dyn LinkResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn from_strategies(strategies: &[Strategy], settings: &ResolverSettings) -> Self {
        let resolvers = strategies
            .iter()
            .map(|strategy| -> Box<dyn LinkResolver> {
                match strategy {
                    Strategy::RedirectChain => Box::new(RedirectChainResolver::new(settings.clone())),
                    Strategy::ShareTokenApi => Box::new(ShareTokenResolver::new(settings.clone())),
                }
            })
            .collect();
        Self::new(resolvers)
    }

    pub fn strategies(&self) -> Vec<Strategy> {
        self.resolvers.iter().map(|r| r.strategy()).collect()
    }

    /// First success wins. When every strategy fails, the primary strategy's
    /// error is returned; later failures are only logged.
    pub async fn resolve(&self, share_url: &str) -> Result<ResolutionResult, LinkError> {
        let mut primary_error = None;
        for resolver in &self.resolvers {
            match resolver.resolve(share_url).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    link_warn!("strategy {:?} failed: {}", resolver.strategy(), err);
                    // An unusable input fails every strategy the same way.
                    if err.kind == FailureKind::InvalidUrl {
                        return Err(primary_error.unwrap_or(err));
                    }
                    primary_error.get_or_insert(err);
                }
            }
        }
        Err(primary_error.unwrap_or_else(|| {
            LinkError::new(FailureKind::NoDownloadLinkFound, "no resolution strategy configured")
        }))
    }
}
