use std::sync::Once;

use pretty_assertions::assert_eq;
use sheetlink_core::{
    update, ChainPolicy, ChainState, Effect, FailureKind, Msg, ResolvedVia, ScrapeSource,
    ScrapedLink,
};
use url::Url;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(link_logging::initialize_for_tests);
}

fn policy(max_hops: usize) -> ChainPolicy {
    ChainPolicy {
        max_hops,
        ..ChainPolicy::default()
    }
}

fn start(url: &str, max_hops: usize) -> (ChainState, Effect) {
    ChainState::start(url, policy(max_hops)).expect("chain started")
}

fn redirect(location: &str) -> Msg {
    Msg::HopResponse {
        status: 302,
        location: Some(location.to_string()),
        content_type: None,
        is_html: false,
    }
}

fn ok_binary() -> Msg {
    Msg::HopResponse {
        status: 200,
        location: None,
        content_type: Some("application/octet-stream".to_string()),
        is_html: false,
    }
}

fn ok_html() -> Msg {
    Msg::HopResponse {
        status: 200,
        location: None,
        content_type: Some("text/html; charset=utf-8".to_string()),
        is_html: true,
    }
}

fn link(url: &str, source: ScrapeSource) -> ScrapedLink {
    ScrapedLink {
        url: Url::parse(url).unwrap(),
        source,
    }
}

#[test]
fn first_effect_fetches_share_url() {
    init_logging();
    let (state, effect) = start("https://1drv.ms/x/s!abc", 12);
    assert_eq!(
        effect,
        Effect::Fetch {
            url: Url::parse("https://1drv.ms/x/s!abc").unwrap()
        }
    );
    assert_eq!(state.visited(), ["https://1drv.ms/x/s!abc".to_string()]);
    assert_eq!(state.hops(), 1);
}

#[test]
fn unparsable_share_url_fails_without_fetch() {
    let err = ChainState::start("not a url", ChainPolicy::default()).unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);

    let err = ChainState::start("ftp://example.com/file", ChainPolicy::default()).unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
    assert!(err.visited.is_empty());
}

#[test]
fn terminal_binary_on_first_hop_has_no_via() {
    let (state, _) = start("https://files.example.com/book.xlsx", 12);
    let (_, effect) = update(state, ok_binary());
    match effect {
        Effect::Resolved(result) => {
            assert_eq!(result.terminal_url, "https://files.example.com/book.xlsx");
            assert_eq!(result.resolved_via, None);
            assert_eq!(result.http_status, 200);
            assert_eq!(result.visited.len(), 1);
        }
        other => panic!("unexpected effect {other:?}"),
    }
}

#[test]
fn redirect_chain_records_every_hop_in_order() {
    let (state, _) = start("https://a.example.com/start", 12);
    let (state, effect) = update(state, redirect("/second"));
    assert_eq!(
        effect,
        Effect::Fetch {
            url: Url::parse("https://a.example.com/second").unwrap()
        }
    );
    let (state, _) = update(state, redirect("https://b.example.com/third?x=1"));
    let (_, effect) = update(state, ok_binary());

    let Effect::Resolved(result) = effect else {
        panic!("expected resolution");
    };
    assert_eq!(
        result.visited,
        vec![
            "https://a.example.com/start".to_string(),
            "https://a.example.com/second".to_string(),
            "https://b.example.com/third?x=1".to_string(),
        ]
    );
    assert_eq!(result.terminal_url, "https://b.example.com/third?x=1");
    assert_eq!(result.resolved_via, Some(ResolvedVia::Redirect));
}

#[test]
fn redirect_budget_is_exact() {
    let (mut state, mut effect) = start("https://a.example.com/0", 3);
    assert!(matches!(effect, Effect::Fetch { .. }));
    for hop in 1..=3 {
        (state, effect) = update(state, redirect(&format!("/{hop}")));
    }
    match effect {
        Effect::Failed(err) => {
            assert_eq!(err.kind, FailureKind::TooManyRedirects { max_hops: 3 });
            assert_eq!(err.visited.len(), 3);
        }
        other => panic!("unexpected effect {other:?}"),
    }
}

#[test]
fn missing_location_fails_and_keeps_offending_url() {
    let (state, _) = start("https://a.example.com/start", 12);
    let (_, effect) = update(
        state,
        Msg::HopResponse {
            status: 301,
            location: None,
            content_type: None,
            is_html: false,
        },
    );
    match effect {
        Effect::Failed(err) => {
            assert_eq!(err.kind, FailureKind::MissingLocationHeader);
            assert_eq!(err.visited, vec!["https://a.example.com/start".to_string()]);
        }
        other => panic!("unexpected effect {other:?}"),
    }
}

#[test]
fn url_params_terminate_on_first_fetch() {
    let (state, _) = start(
        "https://onedrive.live.com/redir?resid=XYZ&authkey=ABC&page=view",
        12,
    );
    let (_, effect) = update(state, ok_html());
    let Effect::Resolved(result) = effect else {
        panic!("expected resolution");
    };
    assert_eq!(result.resolved_via, Some(ResolvedVia::UrlParams));
    assert_eq!(
        result.terminal_url,
        "https://onedrive.live.com/download?resid=XYZ&authkey=ABC"
    );
    assert_eq!(result.visited.len(), 1);
}

#[test]
fn login_host_resolves_regardless_of_status() {
    let (state, _) = start("https://1drv.ms/x/s!abc", 12);
    let (state, _) = update(state, redirect("https://login.live.com/login.srf?wa=1"));
    let (_, effect) = update(
        state,
        Msg::HopResponse {
            status: 403,
            location: None,
            content_type: Some("text/html".to_string()),
            is_html: true,
        },
    );
    let Effect::Resolved(result) = effect else {
        panic!("expected resolution");
    };
    assert_eq!(result.terminal_host().as_deref(), Some("login.live.com"));
    assert_eq!(result.http_status, 403);
}

#[test]
fn error_status_fails_with_upstream_error() {
    let (state, _) = start("https://a.example.com/gone", 12);
    let (_, effect) = update(
        state,
        Msg::HopResponse {
            status: 404,
            location: None,
            content_type: Some("text/html".to_string()),
            is_html: true,
        },
    );
    assert!(matches!(
        effect,
        Effect::Failed(err) if err.kind == FailureKind::UpstreamHttpError { status: 404 }
    ));
}

#[test]
fn html_asks_for_body_scan() {
    let (state, _) = start("https://a.example.com/page", 12);
    let (_, effect) = update(state, ok_html());
    assert_eq!(effect, Effect::ScanBody);
}

#[test]
fn embed_candidate_terminates_with_canonical_download_url() {
    let (state, _) = start("https://a.example.com/page", 12);
    let (state, _) = update(state, ok_html());
    let (_, effect) = update(
        state,
        Msg::BodyScanned(vec![link(
            "https://onedrive.live.com/embed?resid=XYZ&authkey=ABC&em=2",
            ScrapeSource::EmbedReference,
        )]),
    );
    let Effect::Resolved(result) = effect else {
        panic!("expected resolution");
    };
    assert_eq!(result.resolved_via, Some(ResolvedVia::HtmlEmbedUrl));
    assert_eq!(
        result.terminal_url,
        "https://onedrive.live.com/download?resid=XYZ&authkey=ABC"
    );
}

#[test]
fn scanned_candidate_without_reference_is_followed() {
    let (state, _) = start("https://a.example.com/page", 12);
    let (state, _) = update(state, ok_html());
    let (state, effect) = update(
        state,
        Msg::BodyScanned(vec![
            link("https://a.example.com/page", ScrapeSource::ProviderLink),
            link("https://a.example.com/next", ScrapeSource::MetaRefresh),
        ]),
    );
    assert_eq!(
        effect,
        Effect::Fetch {
            url: Url::parse("https://a.example.com/next").unwrap()
        }
    );
    let (_, effect) = update(state, ok_binary());
    let Effect::Resolved(result) = effect else {
        panic!("expected resolution");
    };
    assert_eq!(result.resolved_via, Some(ResolvedVia::HtmlRegex));
    assert_eq!(result.terminal_url, "https://a.example.com/next");
}

#[test]
fn no_new_candidate_fails() {
    let (state, _) = start("https://a.example.com/page", 12);
    let (state, _) = update(state, ok_html());
    let (_, effect) = update(
        state,
        Msg::BodyScanned(vec![link(
            "https://a.example.com/page",
            ScrapeSource::ProviderLink,
        )]),
    );
    assert!(matches!(
        effect,
        Effect::Failed(err) if err.kind == FailureKind::NoDownloadLinkFound
    ));
}
