use thiserror::Error;

/// Every way an invocation can end without the requested payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("redirect response without a Location header")]
    MissingLocationHeader,
    #[error("no download link found in HTML response")]
    NoDownloadLinkFound,
    #[error("max hops ({max_hops}) exceeded")]
    TooManyRedirects { max_hops: usize },
    #[error("upstream http status {status}")]
    UpstreamHttpError { status: u16 },
    #[error("login required (link is not anonymous or access is restricted)")]
    LoginRequired,
    #[error("share metadata request failed")]
    MetadataFetchFailed,
    #[error("share metadata has no download url")]
    DownloadUrlMissing,
    #[error("sheet '{requested}' not found (available: {})", .available.join(", "))]
    SheetNotFound {
        requested: String,
        available: Vec<String>,
    },
    #[error("download http status {status}")]
    DownloadHttpError { status: u16 },
    #[error("invalid url")]
    InvalidUrl,
    #[error("timeout")]
    Timeout,
    #[error("response too large (max {max_bytes}, actual {actual:?})")]
    TooLarge { max_bytes: u64, actual: Option<u64> },
    #[error("download returned an HTML page instead of a workbook")]
    UnexpectedHtml,
    #[error("workbook could not be read")]
    WorkbookUnreadable,
    #[error("bad request")]
    BadRequest,
    #[error("network error")]
    Network,
}

impl FailureKind {
    /// Stable snake_case code rendered as `errorKind` in responses.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::MissingLocationHeader => "missing_location_header",
            FailureKind::NoDownloadLinkFound => "no_download_link_found",
            FailureKind::TooManyRedirects { .. } => "too_many_redirects",
            FailureKind::UpstreamHttpError { .. } => "upstream_http_error",
            FailureKind::LoginRequired => "login_required",
            FailureKind::MetadataFetchFailed => "metadata_fetch_failed",
            FailureKind::DownloadUrlMissing => "download_url_missing",
            FailureKind::SheetNotFound { .. } => "sheet_not_found",
            FailureKind::DownloadHttpError { .. } => "download_http_error",
            FailureKind::InvalidUrl => "invalid_url",
            FailureKind::Timeout => "timeout",
            FailureKind::TooLarge { .. } => "too_large",
            FailureKind::UnexpectedHtml => "unexpected_html",
            FailureKind::WorkbookUnreadable => "workbook_unreadable",
            FailureKind::BadRequest => "bad_request",
            FailureKind::Network => "network",
        }
    }

    /// Upstream status carried by the kind, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FailureKind::UpstreamHttpError { status } | FailureKind::DownloadHttpError { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// A failed resolution, download or parse, with the URLs touched on the way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct LinkError {
    pub kind: FailureKind,
    pub message: String,
    pub visited: Vec<String>,
    pub content_type: Option<String>,
    pub body_snippet: Option<String>,
}

impl LinkError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            visited: Vec::new(),
            content_type: None,
            body_snippet: None,
        }
    }

    pub fn with_visited(mut self, visited: &[String]) -> Self {
        self.visited = visited.to_vec();
        self
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_body_snippet(mut self, snippet: Option<String>) -> Self {
        self.body_snippet = snippet;
        self
    }
}
