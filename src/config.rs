use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::model::{Direction, Sku};
use crate::{Error, Result};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_STOREFRONT_HOST: &str = "https://my.callofduty.com";
pub const DEFAULT_API_HOST: &str = "https://my.callofduty.com/api/papi-client";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/103.0.0.0 Safari/537.36";

/// Sku ranges bundles were found in for the known titles.
const GAME_PRESETS: &[(&str, Sku, Sku)] = &[
    ("mw", 400_003, 400_512),
    ("cw", 29_490_000, 29_492_000),
    ("vg", 33_954_444, 33_954_664),
];

pub fn preset_range(game: &str) -> Option<(Sku, Sku)> {
    GAME_PRESETS
        .iter()
        .find(|(code, _, _)| *code == game)
        .map(|&(_, start, stop)| (start, stop))
}

#[derive(Debug, Parser)]
#[command(name = "codstore", version, about = "Probe store SKUs for bundles and record them to csv")]
pub struct Cli {
    /// Game code, e.g. mw, cw, vg
    #[arg(env = "CODSTORE_GAME")]
    pub game: String,
    /// First sku of the range (overrides the game preset)
    #[arg(long, env = "CODSTORE_START")]
    pub start: Option<Sku>,
    /// Sku the range stops at, exclusive (overrides the game preset)
    #[arg(long, env = "CODSTORE_STOP")]
    pub stop: Option<Sku>,
    /// Probe from the top of the range down
    #[arg(long, env = "CODSTORE_DESCENDING")]
    pub descending: bool,
    /// Probes in flight at once
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, env = "CODSTORE_WORKERS")]
    pub workers: usize,
    /// Per request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS, env = "CODSTORE_TIMEOUT_MS")]
    pub timeout_ms: u64,
    /// Directory holding the bundles_<game>.csv stores
    #[arg(long, default_value = "data", env = "CODSTORE_DATA_DIR")]
    pub data_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_STOREFRONT_HOST, env = "CODSTORE_STOREFRONT_HOST")]
    pub storefront_host: String,
    #[arg(long, default_value = DEFAULT_API_HOST, env = "CODSTORE_API_HOST")]
    pub api_host: String,
    #[arg(long, default_value = "en", env = "CODSTORE_LOCALE")]
    pub locale: String,
    /// Don't fetch prices while discovering; leave them to the backfill
    #[arg(long, env = "CODSTORE_SKIP_COSTS")]
    pub skip_costs: bool,
    #[arg(long, conflicts_with = "backfill_only", env = "CODSTORE_SKIP_BACKFILL")]
    pub skip_backfill: bool,
    /// Only fill in missing prices of an existing store
    #[arg(long, env = "CODSTORE_BACKFILL_ONLY")]
    pub backfill_only: bool,
    #[arg(long, default_value = "codstore.log", env = "CODSTORE_LOG_FILE")]
    pub log_file: PathBuf,
}

/// Validated settings handed to every pass.
#[derive(Debug, Clone)]
pub struct Config {
    pub game: String,
    pub start: Sku,
    pub stop: Sku,
    pub direction: Direction,
    pub workers: usize,
    pub timeout: Duration,
    pub data_dir: PathBuf,
    pub storefront_host: String,
    pub api_host: String,
    pub locale: String,
    pub fetch_costs: bool,
}

impl Config {
    /// Config with defaults for everything but the game and its range.
    pub fn new(game: impl Into<String>, start: Sku, stop: Sku, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            game: game.into(),
            start,
            stop,
            direction: Direction::Ascending,
            workers: DEFAULT_WORKERS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            data_dir: data_dir.into(),
            storefront_host: DEFAULT_STOREFRONT_HOST.into(),
            api_host: DEFAULT_API_HOST.into(),
            locale: "en".into(),
            fetch_costs: true,
        }
    }

    /// Location of this game's discovery store.
    pub fn store_path(&self) -> PathBuf {
        store_path(&self.data_dir, &self.game)
    }

    pub fn validate(&self) -> Result<()> {
        if self.game.is_empty() || !self.game.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Config(format!("game code `{}` must be alphanumeric", self.game)));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be above 0 ms".into()));
        }
        if self.start > self.stop {
            return Err(Error::Config(format!(
                "start {} is past stop {}",
                self.start, self.stop
            )));
        }
        Ok(())
    }
}

pub fn store_path(data_dir: &Path, game: &str) -> PathBuf {
    data_dir.join(format!("bundles_{game}.csv"))
}

impl TryFrom<&Cli> for Config {
    type Error = Error;

    fn try_from(cli: &Cli) -> Result<Self> {
        let preset = preset_range(&cli.game);
        let (start, stop) = match (cli.start, cli.stop, preset) {
            (Some(start), Some(stop), _) => (start, stop),
            (start, stop, Some((preset_start, preset_stop))) => {
                (start.unwrap_or(preset_start), stop.unwrap_or(preset_stop))
            }
            _ => {
                return Err(Error::Config(format!(
                    "no sku range known for `{}`, pass --start and --stop",
                    cli.game
                )))
            }
        };

        let config = Config {
            game: cli.game.clone(),
            start,
            stop,
            direction: if cli.descending {
                Direction::Descending
            } else {
                Direction::Ascending
            },
            workers: cli.workers,
            timeout: Duration::from_millis(cli.timeout_ms),
            data_dir: cli.data_dir.clone(),
            storefront_host: cli.storefront_host.trim_end_matches('/').to_string(),
            api_host: cli.api_host.trim_end_matches('/').to_string(),
            locale: cli.locale.clone(),
            fetch_costs: !cli.skip_costs,
        };
        config.validate()?;
        Ok(config)
    }
}
