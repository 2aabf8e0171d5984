use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{BundleRecord, ProbeOutcome, Sku};
use crate::parse::{classify_title, parse_detail, parse_inventory};
use crate::request::Storefront;
use crate::{Error, Result};

/// Resolves single skus against the store. Cheap to clone, one per task.
#[derive(Clone)]
pub struct Prober {
    storefront: Arc<dyn Storefront>,
    game: Arc<str>,
    timeout: Duration,
    fetch_costs: bool,
}

impl Prober {
    pub fn new(storefront: Arc<dyn Storefront>, config: &Config) -> Self {
        Self {
            storefront,
            game: config.game.as_str().into(),
            timeout: config.timeout,
            fetch_costs: config.fetch_costs,
        }
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    /// Fetches and classifies the detail page of `sku`. Failures are logged here
    /// and come back as `ProbeOutcome::Error`, leaving the sku to the next run.
    pub async fn probe(&self, sku: Sku) -> ProbeOutcome {
        match self.try_probe(sku).await {
            Ok(Some(record)) => {
                debug!(sku, game = %self.game, title = %record.title, "found bundle");
                ProbeOutcome::Found(record)
            }
            Ok(None) => ProbeOutcome::NotFound,
            Err(e) => {
                warn!(sku, game = %self.game, op = "probe", kind = e.kind(), "{e}");
                ProbeOutcome::Error(e.to_string())
            }
        }
    }

    async fn try_probe(&self, sku: Sku) -> Result<Option<BundleRecord>> {
        let Some(html) = self
            .bounded(sku, self.storefront.detail_page(sku, &self.game))
            .await?
        else {
            return Ok(None);
        };

        let page = parse_detail(sku, html).await?;
        let Some(title) = classify_title(&page.title) else {
            return Ok(None);
        };
        let url = page
            .url
            .unwrap_or_else(|| self.storefront.detail_url(sku, &self.game));

        // A failed price lookup keeps the bundle, the backfill retries it later.
        let cost = if self.fetch_costs { self.cost(sku).await } else { None };

        Ok(Some(BundleRecord { title, url, sku, cost }))
    }

    /// Price of `sku`, or `None` if it can't be had right now.
    pub async fn cost(&self, sku: Sku) -> Option<u64> {
        match self.try_cost(sku).await {
            Ok(cost) => cost,
            Err(e) => {
                warn!(sku, game = %self.game, op = "cost", kind = e.kind(), "{e}");
                None
            }
        }
    }

    pub async fn try_cost(&self, sku: Sku) -> Result<Option<u64>> {
        let body = self
            .bounded(sku, self.storefront.inventory(sku, &self.game))
            .await?;
        parse_inventory(&body)
    }

    async fn bounded<T>(&self, sku: Sku, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                sku,
                millis: self.timeout.as_millis(),
            })?
    }
}
