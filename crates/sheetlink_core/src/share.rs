use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use url::Url;

/// The `(resid, authkey)` pair that identifies a shared OneDrive item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareReference {
    pub resource_id: String,
    pub auth_key: String,
}

impl ShareReference {
    pub fn new(resource_id: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            auth_key: auth_key.into(),
        }
    }

    /// Reads `resid` and `authkey` from the query string; parameter names are
    /// matched case-insensitively and both values must be non-empty.
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut resource_id = None;
        let mut auth_key = None;
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            if key.eq_ignore_ascii_case("resid") && resource_id.is_none() {
                resource_id = Some(value.into_owned());
            } else if key.eq_ignore_ascii_case("authkey") && auth_key.is_none() {
                auth_key = Some(value.into_owned());
            }
        }
        Some(Self::new(resource_id?, auth_key?))
    }

    /// Canonical `<origin>/download?resid=..&authkey=..` on the origin of `base`.
    pub fn download_url(&self, base: &Url) -> Option<Url> {
        let mut url = base.join("/download").ok()?;
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("resid", &self.resource_id)
            .append_pair("authkey", &self.auth_key);
        Some(url)
    }
}

/// Encodes a sharing URL as a OneDrive share token: `u!` + unpadded base64url.
pub fn share_token(share_url: &str) -> String {
    format!("u!{}", URL_SAFE_NO_PAD.encode(share_url.as_bytes()))
}

/// True when `host` equals one of `domains` or is a subdomain of one.
pub fn host_matches(host: &str, domains: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    domains.iter().any(|domain| {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        host == domain
            || host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// True when the URL points at an identity-provider login page.
pub fn is_login_url(url: &Url, login_domains: &[String]) -> bool {
    url.host_str()
        .is_some_and(|host| host_matches(host, login_domains))
}
