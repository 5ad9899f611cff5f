use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Resolve,
    Download,
    Parse,
    Ping,
}

impl FromStr for Mode {
    type Err = InvocationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "resolve" => Ok(Mode::Resolve),
            "download" => Ok(Mode::Download),
            "parse" => Ok(Mode::Parse),
            "ping" => Ok(Mode::Ping),
            _ => Err(InvocationError::InvalidMode(raw.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Resolve => "resolve",
            Mode::Download => "download",
            Mode::Parse => "parse",
            Mode::Ping => "ping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    #[error("Invalid mode '{0}'. Use resolve|download|parse|ping")]
    InvalidMode(String),
    #[error("Missing ?url=")]
    MissingUrl,
}

/// One handler invocation, as carried by the query string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    pub url: Option<String>,
    pub mode: Mode,
    pub sheet: Option<String>,
}

impl Invocation {
    /// Parses `url`, `mode` and `sheet` from a query string. A leading `?` is
    /// ignored, blank values count as absent, and the first occurrence wins.
    pub fn from_query(query: &str) -> Result<Self, InvocationError> {
        let query = query.trim().trim_start_matches('?');
        let mut url = None;
        let mut mode = None;
        let mut sheet = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "url" if url.is_none() => url = Some(value.to_string()),
                "mode" if mode.is_none() => mode = Some(value.parse::<Mode>()?),
                "sheet" if sheet.is_none() => sheet = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(Self {
            url,
            mode: mode.unwrap_or_default(),
            sheet,
        })
    }
}
