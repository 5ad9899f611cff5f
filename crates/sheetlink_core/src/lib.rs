//! Sheetlink core: pure link-resolution model and response shapes.
mod effect;
mod envelope;
mod error;
mod invocation;
mod msg;
mod share;
mod state;
mod types;
mod update;

pub use effect::Effect;
pub use envelope::{Envelope, PingReport};
pub use error::{FailureKind, LinkError};
pub use invocation::{Invocation, InvocationError, Mode};
pub use msg::Msg;
pub use share::{host_matches, is_login_url, share_token, ShareReference};
pub use state::{ChainPolicy, ChainState};
pub use types::{ResolutionResult, ResolvedVia, Row, ScrapeSource, ScrapedLink, Strategy};
pub use update::{is_redirect, update};
