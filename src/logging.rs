//! Run log setup: human readable console output plus a per run log file.

use std::fs::File;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::Result;

/// Installs the global subscriber. The log file is truncated on every run.
///
/// Keep the returned guard alive until the program exits, otherwise buffered
/// file lines are dropped.
pub fn init_logging(log_file: &Path) -> Result<WorkerGuard> {
    let file = File::create(log_file)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(false).with_filter(console_filter);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug,hyper=info,hyper_util=info,reqwest=info"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("logging already initialised: {e}")))?;

    Ok(guard)
}
