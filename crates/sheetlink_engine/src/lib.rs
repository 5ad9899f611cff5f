//! Sheetlink engine: HTTP resolution, download and workbook parsing.
mod client;
mod config;
mod decode;
mod download;
mod resolve;
mod scrape;
mod service;
mod share_api;
mod sheet;

pub use config::{ConfigError, DownloadSettings, ResolverSettings, ServiceConfig};
pub use decode::{decode_html, decode_html_lossy, DecodeError, DecodedHtml};
pub use download::{DownloadedFile, Downloader};
pub use resolve::{FallbackResolver, LinkResolver, RedirectChainResolver};
pub use scrape::{LinkScraper, ProviderLinkScraper};
pub use service::LinkService;
pub use share_api::ShareTokenResolver;
pub use sheet::{project_rows, rows_from_range, CalamineSheetParser, ParsedSheet, SheetParser};
