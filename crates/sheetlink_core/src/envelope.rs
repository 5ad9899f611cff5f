use serde::Serialize;

use crate::{FailureKind, InvocationError, LinkError, Mode, ResolutionResult, Row};

/// Status, headers and a verdict for a share-token content request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingReport {
    pub http_status: u16,
    pub has_location: bool,
    pub location_host: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub note: String,
    pub body_snippet: Option<String>,
}

impl PingReport {
    /// A redirect counts: the share is readable, the bytes just live elsewhere.
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.http_status)
    }
}

/// JSON body returned by every invocation, success or not.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// HTTP status for the hosting function; not part of the body.
    #[serde(skip)]
    pub status_code: u16,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub login_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolutionResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub visited: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_bytes_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<PingReport>,
}

impl Envelope {
    pub fn success(step: Mode) -> Self {
        Self {
            status_code: 200,
            ok: true,
            step: Some(step),
            ..Self::default()
        }
    }

    /// Business failure: still a 200 for the host, `ok=false` in the body.
    pub fn failure(step: Mode, err: &LinkError) -> Self {
        let sheet_names = match &err.kind {
            FailureKind::SheetNotFound { available, .. } => Some(available.clone()),
            _ => None,
        };
        Self {
            status_code: 200,
            ok: false,
            step: Some(step),
            error: Some(err.to_string()),
            error_kind: Some(err.kind.code().to_string()),
            login_required: err.kind == FailureKind::LoginRequired,
            visited: err.visited.clone(),
            http_status: err.kind.http_status(),
            content_type: err.content_type.clone(),
            body_snippet: err.body_snippet.clone(),
            sheet_names,
            ..Self::default()
        }
    }

    /// The resolved link ends on a login page: expected outcome, not a fault.
    pub fn login_required(step: Mode, resolved: ResolutionResult) -> Self {
        Self {
            status_code: 200,
            ok: false,
            step: Some(step),
            error: Some(FailureKind::LoginRequired.to_string()),
            error_kind: Some(FailureKind::LoginRequired.code().to_string()),
            login_required: true,
            http_status: Some(resolved.http_status),
            resolved: Some(resolved),
            ..Self::default()
        }
    }

    pub fn bad_request(err: &InvocationError) -> Self {
        Self {
            status_code: 400,
            ok: false,
            error: Some(err.to_string()),
            error_kind: Some(FailureKind::BadRequest.code().to_string()),
            ..Self::default()
        }
    }

    /// Anything that escaped the typed error paths.
    pub fn internal(step: Option<Mode>, message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            ok: false,
            step,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_resolved(mut self, resolved: ResolutionResult) -> Self {
        self.resolved = Some(resolved);
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({ "ok": false, "error": err.to_string() })
        })
    }
}
