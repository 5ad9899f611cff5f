use crate::state::PendingBody;
use crate::{
    is_login_url, ChainState, Effect, FailureKind, Msg, ResolutionResult, ResolvedVia,
    ShareReference,
};

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

pub fn is_redirect(status: u16) -> bool {
    REDIRECT_STATUSES.contains(&status)
}

/// Pure update function: applies an observation to the chain and returns the
/// next effect. Redirects always win over body scanning.
pub fn update(state: ChainState, msg: Msg) -> (ChainState, Effect) {
    match msg {
        Msg::HopResponse {
            status,
            location,
            content_type,
            is_html,
        } => on_response(state, status, location, content_type, is_html),
        Msg::BodyScanned(candidates) => on_scanned(state, candidates),
    }
}

fn on_response(
    mut state: ChainState,
    status: u16,
    location: Option<String>,
    content_type: Option<String>,
    is_html: bool,
) -> (ChainState, Effect) {
    if is_redirect(status) {
        let Some(location) = location.filter(|loc| !loc.trim().is_empty()) else {
            let effect = state.fail(
                FailureKind::MissingLocationHeader,
                format!("status {status} from {} without Location", state.current),
            );
            return (state, effect);
        };
        return match state.current.join(location.trim()) {
            Ok(next) => {
                state.via = Some(ResolvedVia::Redirect);
                state.fetch_next(next)
            }
            Err(err) => {
                let effect = state.fail(
                    FailureKind::InvalidUrl,
                    format!("unusable Location '{location}': {err}"),
                );
                (state, effect)
            }
        };
    }

    // Login pages end the walk; the caller decides what that means.
    if is_login_url(&state.current, &state.policy.login_domains) {
        let result = resolved(&state, state.current.to_string(), status, content_type, state.via);
        return (state, Effect::Resolved(result));
    }

    if let Some(share) = ShareReference::from_url(&state.current) {
        let terminal = share
            .download_url(&state.current)
            .map(String::from)
            .unwrap_or_else(|| state.current.to_string());
        let result = resolved(&state, terminal, status, content_type, Some(ResolvedVia::UrlParams));
        return (state, Effect::Resolved(result));
    }

    let success = (200..300).contains(&status);
    if !success {
        let effect = state.fail(
            FailureKind::UpstreamHttpError { status },
            format!("{} answered {status}", state.current),
        );
        return (state, effect);
    }

    if is_html {
        state.pending = Some(PendingBody {
            status,
            content_type,
        });
        return (state, Effect::ScanBody);
    }

    let result = resolved(&state, state.current.to_string(), status, content_type, state.via);
    (state, Effect::Resolved(result))
}

fn on_scanned(
    mut state: ChainState,
    candidates: Vec<crate::ScrapedLink>,
) -> (ChainState, Effect) {
    let Some(pending) = state.pending.take() else {
        let effect = state.fail(
            FailureKind::NoDownloadLinkFound,
            "body scanned without a pending HTML response",
        );
        return (state, effect);
    };

    let next = candidates.into_iter().find(|candidate| {
        candidate.url != state.current && !state.visited.iter().any(|v| v == candidate.url.as_str())
    });

    let Some(candidate) = next else {
        let effect = state.fail(
            FailureKind::NoDownloadLinkFound,
            format!("no usable link in HTML from {}", state.current),
        );
        return (state, effect);
    };

    let via = candidate.source.resolved_via();
    if let Some(share) = ShareReference::from_url(&candidate.url) {
        let terminal = share
            .download_url(&candidate.url)
            .map(String::from)
            .unwrap_or_else(|| candidate.url.to_string());
        let result = resolved(&state, terminal, pending.status, pending.content_type, Some(via));
        return (state, Effect::Resolved(result));
    }

    state.via = Some(via);
    state.fetch_next(candidate.url)
}

fn resolved(
    state: &ChainState,
    terminal_url: String,
    status: u16,
    content_type: Option<String>,
    via: Option<ResolvedVia>,
) -> ResolutionResult {
    ResolutionResult {
        terminal_url,
        visited: state.visited.clone(),
        http_status: status,
        resolved_via: via,
        content_type,
    }
}
