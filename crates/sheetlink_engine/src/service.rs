use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use link_logging::{link_error, link_info, link_warn, set_invocation_id};
use sheetlink_core::{host_matches, Envelope, Invocation, InvocationError, Mode, ResolutionResult};

use crate::config::{ConfigError, ServiceConfig};
use crate::download::Downloader;
use crate::resolve::FallbackResolver;
use crate::share_api::ShareTokenResolver;
use crate::sheet::{project_rows, CalamineSheetParser, SheetParser};

const ENVELOPE_HEX_BYTES: usize = 16;

/// The invocation boundary: one query in, one envelope out.
///
/// Every failure, including a panicking parser, ends up in the envelope.
pub struct LinkService {
    config: ServiceConfig,
    resolver: FallbackResolver,
    share_api: ShareTokenResolver,
    downloader: Downloader,
    parser: Arc<dyn SheetParser>,
    next_invocation: AtomicU64,
}

impl LinkService {
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            resolver: FallbackResolver::from_strategies(&config.strategies, &config.resolver),
            share_api: ShareTokenResolver::new(config.resolver.clone()),
            downloader: Downloader::new(
                config.download.clone(),
                config.resolver.html_content_types.clone(),
            ),
            parser: Arc::new(CalamineSheetParser),
            next_invocation: AtomicU64::new(1),
            config,
        })
    }

    pub fn with_parser(mut self, parser: Arc<dyn SheetParser>) -> Self {
        self.parser = parser;
        self
    }

    pub async fn handle_query(&self, query: &str) -> Envelope {
        match Invocation::from_query(query) {
            Ok(invocation) => self.handle(invocation).await,
            Err(err) => {
                link_warn!("rejected query '{}': {}", query, err);
                Envelope::bad_request(&err)
            }
        }
    }

    pub async fn handle(&self, invocation: Invocation) -> Envelope {
        set_invocation_id(self.next_invocation.fetch_add(1, Ordering::Relaxed));
        let mode = invocation.mode;
        let Some(share_url) = invocation.url.or_else(|| self.config.share_url.clone()) else {
            return Envelope::bad_request(&InvocationError::MissingUrl);
        };
        link_info!("{} {}", mode, share_url);

        let envelope = match mode {
            Mode::Resolve => self.resolve_step(&share_url).await,
            Mode::Download => self.download_step(&share_url).await,
            Mode::Parse => {
                let sheet = invocation.sheet.or_else(|| self.config.sheet_name.clone());
                self.parse_step(&share_url, sheet).await
            }
            Mode::Ping => self.ping_step(&share_url).await,
        };
        if !envelope.ok {
            link_warn!(
                "{} finished with {}",
                mode,
                envelope.error_kind.as_deref().unwrap_or("error")
            );
        }
        envelope
    }

    /// Resolves and splits off the login-page outcome.
    async fn resolve_checked(&self, mode: Mode, share_url: &str) -> Result<ResolutionResult, Envelope> {
        let resolved = self
            .resolver
            .resolve(share_url)
            .await
            .map_err(|err| Envelope::failure(mode, &err))?;
        if self.ends_on_login(&resolved) {
            link_warn!("{} ends on a login page", share_url);
            return Err(Envelope::login_required(mode, resolved));
        }
        Ok(resolved)
    }

    fn ends_on_login(&self, resolved: &ResolutionResult) -> bool {
        resolved
            .terminal_host()
            .is_some_and(|host| host_matches(&host, &self.config.resolver.login_domains))
    }

    async fn resolve_step(&self, share_url: &str) -> Envelope {
        match self.resolve_checked(Mode::Resolve, share_url).await {
            Ok(resolved) => Envelope {
                http_status: Some(resolved.http_status),
                content_type: resolved.content_type.clone(),
                ..Envelope::success(Mode::Resolve).with_resolved(resolved)
            },
            Err(envelope) => envelope,
        }
    }

    async fn download_step(&self, share_url: &str) -> Envelope {
        let resolved = match self.resolve_checked(Mode::Download, share_url).await {
            Ok(resolved) => resolved,
            Err(envelope) => return envelope,
        };
        match self.downloader.download(&resolved.terminal_url).await {
            Ok(file) => Envelope {
                http_status: Some(file.http_status),
                content_type: file.content_type.clone(),
                bytes: Some(file.bytes.len() as u64),
                first_bytes_hex: Some(file.first_bytes_hex(ENVELOPE_HEX_BYTES)),
                ..Envelope::success(Mode::Download).with_resolved(resolved)
            },
            Err(err) => Envelope::failure(Mode::Download, &err).with_resolved(resolved),
        }
    }

    async fn parse_step(&self, share_url: &str, sheet: Option<String>) -> Envelope {
        let resolved = match self.resolve_checked(Mode::Parse, share_url).await {
            Ok(resolved) => resolved,
            Err(envelope) => return envelope,
        };
        let file = match self.downloader.download(&resolved.terminal_url).await {
            Ok(file) => file,
            Err(err) => return Envelope::failure(Mode::Parse, &err).with_resolved(resolved),
        };

        let parser = self.parser.clone();
        let fields = self.config.fields.clone();
        let bytes = file.bytes;
        let parsed = tokio::task::spawn_blocking(move || {
            parser
                .parse(&bytes, sheet.as_deref())
                .map(|mut parsed| {
                    parsed.rows = project_rows(std::mem::take(&mut parsed.rows), &fields);
                    parsed
                })
        })
        .await;

        match parsed {
            Ok(Ok(parsed)) => {
                link_info!("parsed {} row(s) from sheet '{}'", parsed.rows.len(), parsed.sheet);
                Envelope {
                    http_status: Some(file.http_status),
                    content_type: file.content_type,
                    sheet: Some(parsed.sheet),
                    sheet_names: Some(parsed.sheet_names),
                    row_count: Some(parsed.rows.len()),
                    rows: Some(parsed.rows),
                    ..Envelope::success(Mode::Parse).with_resolved(resolved)
                }
            }
            Ok(Err(err)) => Envelope::failure(Mode::Parse, &err).with_resolved(resolved),
            Err(join_err) => {
                link_error!("sheet parser aborted: {}", join_err);
                Envelope::internal(Some(Mode::Parse), format!("sheet parser aborted: {join_err}"))
                    .with_resolved(resolved)
            }
        }
    }

    async fn ping_step(&self, share_url: &str) -> Envelope {
        match self.share_api.ping(share_url).await {
            Ok(report) => Envelope {
                ok: report.ok(),
                http_status: Some(report.http_status),
                content_type: report.content_type.clone(),
                ping: Some(report),
                ..Envelope::success(Mode::Ping)
            },
            Err(err) => Envelope::failure(Mode::Ping, &err),
        }
    }
}

impl std::fmt::Debug for LinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkService")
            .field("strategies", &self.resolver.strategies())
            .field("share_url", &self.config.share_url)
            .finish()
    }
}
