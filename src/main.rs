use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use codstore::{
    backfill::run_backfill,
    config::{Cli, Config},
    info_time,
    logging::init_logging,
    process::run_discovery,
    request::HttpStorefront,
    store::ensure_dir,
    Result,
};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = match init_logging(&cli.log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("codstore: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind(), "{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let start_time = Local::now();
    let config = Config::try_from(cli)?;
    ensure_dir(&config.data_dir)?;
    let storefront = Arc::new(HttpStorefront::new(&config)?);

    if !cli.backfill_only {
        run_discovery(&config, storefront.clone()).await?;
    }
    if !cli.skip_backfill {
        // Keeps whatever discovery recorded even if the backfill can't run.
        if let Err(e) = run_backfill(&config, storefront).await {
            error!(game = %config.game, op = "backfill", kind = e.kind(), "{e}");
        }
    }

    info_time!(start_time, "Full program time:");
    Ok(())
}
