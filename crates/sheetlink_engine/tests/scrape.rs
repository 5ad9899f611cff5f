use pretty_assertions::assert_eq;
use sheetlink_core::ScrapeSource;
use sheetlink_engine::{decode_html, LinkScraper, ProviderLinkScraper, ResolverSettings};
use url::Url;

fn scraper() -> ProviderLinkScraper {
    ProviderLinkScraper::new(ResolverSettings::default().provider_domains)
}

fn base() -> Url {
    Url::parse("https://onedrive.live.com/redir?resid=1").unwrap()
}

fn found(html: &str) -> Vec<(String, ScrapeSource)> {
    scraper()
        .candidates(html, &base())
        .into_iter()
        .map(|link| (link.url.to_string(), link.source))
        .collect()
}

#[test]
fn meta_refresh_comes_before_anything_else() {
    let html = r#"<html><head>
        <meta http-equiv="Refresh" content="0;URL='/download?resid=A&amp;authkey=B'">
        </head><body><a href="https://onedrive.live.com/about">about</a></body></html>"#;

    let links = found(html);
    assert_eq!(
        links[0],
        (
            "https://onedrive.live.com/download?resid=A&authkey=B".to_string(),
            ScrapeSource::MetaRefresh
        )
    );
}

#[test]
fn script_location_assignments_are_candidates() {
    let html = r#"<script>window.location.href = "https:\/\/onedrive.live.com\/view.aspx?cid=1";</script>"#;
    let links = found(html);
    assert_eq!(
        links[0],
        (
            "https://onedrive.live.com/view.aspx?cid=1".to_string(),
            ScrapeSource::ScriptRedirect
        )
    );
}

#[test]
fn direct_downloads_rank_above_embeds_and_provider_links() {
    let html = r#"<body>
        <a href="https://onedrive.live.com/about">about</a>
        <iframe src="https://onedrive.live.com/embed?resid=R&authkey=K"></iframe>
        <a href="https://public.bn.files.1drv.com/y4m/book.xlsx?download=1">get</a>
    </body>"#;

    let sources: Vec<_> = found(html).into_iter().map(|(_, source)| source).collect();
    assert_eq!(
        sources,
        vec![
            ScrapeSource::DirectDownload,
            ScrapeSource::EmbedReference,
            ScrapeSource::ProviderLink,
        ]
    );
}

#[test]
fn static_assets_and_foreign_hosts_are_ignored() {
    let html = r#"<body>
        <script src="https://onedrive.live.com/static/app.js"></script>
        <link href="https://onedrive.live.com/static/site.css">
        <a href="https://tracker.example.test/pixel">t</a>
        <a href="mailto:someone@example.test">mail</a>
    </body>"#;

    assert_eq!(found(html), Vec::new());
    assert_eq!(scraper().extract_candidate_url(html, &base()), None);
}

#[test]
fn duplicates_are_reported_once() {
    let html = r#"<a href="https://onedrive.live.com/download?resid=A&authkey=B">one</a>
                  <a href="https://onedrive.live.com/download?resid=A&authkey=B#top">two</a>"#;
    assert_eq!(found(html).len(), 1);
}

#[test]
fn decode_follows_header_charset() {
    let bytes = b"<html>\xFE</html>";
    let decoded = decode_html(bytes, Some("text/html; charset=windows-1254")).expect("decoded");
    assert_eq!(decoded.html, "<html>\u{015F}</html>");
}
