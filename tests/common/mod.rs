//! Common test utilities: an in-memory storefront and a scratch data dir.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use codstore::{config::Config, model::Sku, request::Storefront, Error, Result};
use tempfile::TempDir;

/// Storefront answering from fixed maps, counting every request it gets.
#[derive(Default)]
pub struct FakeStore {
    pub bundles: HashMap<Sku, String>,
    pub prices: HashMap<Sku, u64>,
    /// Skus whose inventory lookup fails.
    pub broken_prices: HashSet<Sku>,
    /// Every detail request sleeps this long first.
    pub delay: Option<Duration>,
    pub detail_requests: AtomicUsize,
    pub inventory_requests: Mutex<Vec<Sku>>,
}

impl FakeStore {
    pub fn with_bundles(bundles: &[(Sku, &str)]) -> Self {
        Self {
            bundles: bundles
                .iter()
                .map(|&(sku, title)| (sku, title.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    #[allow(dead_code)]
    pub fn detail_requests(&self) -> usize {
        self.detail_requests.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn inventory_requests(&self) -> Vec<Sku> {
        self.inventory_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storefront for FakeStore {
    async fn detail_page(&self, sku: Sku, game: &str) -> Result<Option<String>> {
        self.detail_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let Some(title) = self.bundles.get(&sku) else {
            return Ok(None);
        };
        Ok(Some(format!(
            r#"<html><head><title>{title} | My Call of Duty® Bundles</title>
            <meta property="og:url" content="https://my.callofduty.com/store/sku/{sku}/title/{game}">
            </head><body></body></html>"#
        )))
    }

    async fn inventory(&self, sku: Sku, _game: &str) -> Result<String> {
        self.inventory_requests.lock().unwrap().push(sku);
        if self.broken_prices.contains(&sku) {
            return Err(Error::ParseMissingField { sku, field: "inventory" });
        }
        Ok(match self.prices.get(&sku) {
            Some(cost) => format!(r#"{{"status":"success","data":{{"cost":{cost}}}}}"#),
            None => r#"{"status":"error","data":{"message":"not for sale"}}"#.to_string(),
        })
    }

    fn detail_url(&self, sku: Sku, game: &str) -> String {
        format!("https://my.callofduty.com/store/sku/{sku}/title/{game}")
    }
}

/// Temporary data dir plus a config pointing at it.
pub struct TestRun {
    #[allow(dead_code)]
    pub temp: TempDir,
    pub config: Config,
}

impl TestRun {
    pub fn new(start: Sku, stop: Sku) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::new("vg", start, stop, temp.path());
        config.timeout = Duration::from_millis(200);
        Self { temp, config }
    }

    #[allow(dead_code)]
    pub fn store_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.config.store_path())
            .expect("Failed to read store")
            .lines()
            .map(str::to_string)
            .collect()
    }
}
