use url::Url;

use crate::{Effect, FailureKind, LinkError, ResolvedVia};

/// Hop budget and login domains for one redirect-chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPolicy {
    pub max_hops: usize,
    pub login_domains: Vec<String>,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            max_hops: 12,
            login_domains: vec![
                "login.live.com".to_string(),
                "login.microsoftonline.com".to_string(),
            ],
        }
    }
}

/// Head of the last non-redirect response, held while its body is scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingBody {
    pub(crate) status: u16,
    pub(crate) content_type: Option<String>,
}

/// State of a redirect-chain walk. Only `update` moves it forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub(crate) policy: ChainPolicy,
    pub(crate) current: Url,
    pub(crate) visited: Vec<String>,
    pub(crate) hops: usize,
    pub(crate) via: Option<ResolvedVia>,
    pub(crate) pending: Option<PendingBody>,
}

impl ChainState {
    /// Starts a walk at `share_url`. The first effect is a fetch of the share
    /// URL itself, or a failure when the hop budget is zero.
    pub fn start(share_url: &str, policy: ChainPolicy) -> Result<(Self, Effect), LinkError> {
        let url = Url::parse(share_url.trim())
            .map_err(|err| LinkError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LinkError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let state = Self {
            policy,
            current: url.clone(),
            visited: Vec::new(),
            hops: 0,
            via: None,
            pending: None,
        };
        Ok(state.fetch_next(url))
    }

    pub fn current(&self) -> &Url {
        &self.current
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn hops(&self) -> usize {
        self.hops
    }

    pub(crate) fn fail(&self, kind: FailureKind, message: impl Into<String>) -> Effect {
        Effect::Failed(LinkError::new(kind, message).with_visited(&self.visited))
    }

    /// Spends one hop on `url`, or fails once the budget is gone.
    pub(crate) fn fetch_next(mut self, url: Url) -> (Self, Effect) {
        if self.hops >= self.policy.max_hops {
            let max_hops = self.policy.max_hops;
            let effect = self.fail(
                FailureKind::TooManyRedirects { max_hops },
                format!("max hops ({max_hops}) exceeded at {url}"),
            );
            return (self, effect);
        }
        self.hops += 1;
        self.visited.push(url.to_string());
        self.current = url.clone();
        (self, Effect::Fetch { url })
    }
}
