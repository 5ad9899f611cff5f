use url::Url;

use crate::{LinkError, ResolutionResult};

/// What the chain wants the engine to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// GET this URL without following redirects and report the head.
    Fetch { url: Url },
    /// Read the body of the last response and report scraped candidates.
    ScanBody,
    Resolved(ResolutionResult),
    Failed(LinkError),
}

