use crate::ScrapedLink;

/// Observations the engine feeds back into the chain after doing IO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Response head for the URL requested by the last `Effect::Fetch`.
    HopResponse {
        status: u16,
        /// Raw `Location` header value, unresolved.
        location: Option<String>,
        content_type: Option<String>,
        /// Content type was classified as HTML by the engine.
        is_html: bool,
    },
    /// Candidates scraped from the HTML body requested by `Effect::ScanBody`,
    /// in strategy priority order.
    BodyScanned(Vec<ScrapedLink>),
}
