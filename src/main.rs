use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use typelink::engine::{Reconciler, RunContext};
use typelink::error::{Result, TypelinkError};
use typelink::export::load_rows;
use typelink::memo::ExclusionMemo;
use typelink::operator::ConsoleOperator;
use typelink::persist::Database;
use typelink::settings::Settings;
use typelink::source::adapter_for;

fn run() -> Result<()> {
    let config_path = std::env::var("TYPELINK_CONFIG").unwrap_or_else(|_| "typelink.toml".to_string());
    let settings = Settings::load(&config_path)?;
    info!(?settings, "settings loaded");

    let adapter = adapter_for(&settings.source)
        .ok_or_else(|| TypelinkError::Config(format!("unknown source '{}'", settings.source)))?;
    let database = Database::new(settings.persistence_mode())?;
    let rows = load_rows(&settings.export, settings.delimiter_byte()?)?;
    let mut memo = ExclusionMemo::open(&settings.exclusion_memo)?;
    let context = RunContext::establish(&database, &settings.citation, &settings.collection)?;

    let mut console = ConsoleOperator::stdio();
    let mut reconciler = Reconciler::new(&database, adapter.as_ref(), &mut memo, context);
    if settings.interactive {
        reconciler = reconciler.with_operator(&mut console);
    }
    let summary = reconciler.run(rows)?;
    print!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(TypelinkError::OperatorAbort) => {
            info!("stopped by operator; committed changes are kept");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}
