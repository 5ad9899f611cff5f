//! `sheetlink "<query>"`: runs one invocation and prints the JSON envelope.
//!
//! The query is the same string a hosting function would receive, e.g.
//! `url=https://1drv.ms/x/s!Abc&mode=parse&sheet=Prices`.

mod logging;
mod settings;

use std::process::ExitCode;

use link_logging::{link_error, link_info, link_warn};
use sheetlink_core::Envelope;
use sheetlink_engine::LinkService;

fn main() -> ExitCode {
    let path = settings::config_path();
    let (config, source) = match settings::load(&path) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("sheetlink: {err}");
            return ExitCode::from(2);
        }
    };
    // validate() already checked the level.
    let level = config.level_filter().unwrap_or(log::LevelFilter::Info);
    logging::initialize(level, config.log_file.as_deref());
    match source {
        settings::ConfigSource::File => link_info!("loaded config from {:?}", path),
        settings::ConfigSource::Defaults => link_warn!("no config at {:?}, using defaults", path),
    }

    let query = std::env::args().nth(1).unwrap_or_default();
    let envelope = match run(config.service, &query) {
        Ok(envelope) => envelope,
        Err(err) => {
            link_error!("startup failed: {}", err);
            Envelope::internal(None, err)
        }
    };

    match serde_json::to_string_pretty(&envelope.to_json()) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("sheetlink: failed to render envelope: {err}");
            return ExitCode::FAILURE;
        }
    }
    exit_code(&envelope)
}

fn run(config: sheetlink_engine::ServiceConfig, query: &str) -> Result<Envelope, String> {
    let service = LinkService::new(config).map_err(|err| err.to_string())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("tokio runtime: {err}"))?;
    Ok(runtime.block_on(service.handle_query(query)))
}

fn exit_code(envelope: &Envelope) -> ExitCode {
    match envelope.status_code {
        _ if envelope.ok => ExitCode::SUCCESS,
        400 => ExitCode::from(2),
        500 => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}
