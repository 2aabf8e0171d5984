use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{BundleRecord, Progress, Sku};
use crate::probe::Prober;
use crate::request::Storefront;
use crate::store::{load_records, rewrite_records};
use crate::{info_time, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub rows: usize,
    /// Rows that had no cost going in.
    pub missing: usize,
    pub filled: usize,
}

/// Looks up the price of every stored bundle that lacks one and rewrites the store.
///
/// Must not overlap a discovery pass for the same game, the rewrite would drop
/// rows appended in the meantime.
pub async fn run_backfill(config: &Config, storefront: Arc<dyn Storefront>) -> Result<BackfillReport> {
    let start_time = Local::now();
    let path = config.store_path();
    if !path.exists() {
        info_time!("No store for {} yet, nothing to backfill", config.game);
        return Ok(BackfillReport::default());
    }

    let records = spawn_blocking({
        let path = path.clone();
        move || load_records(&path)
    })
    .await??;

    let missing: Vec<Sku> = records
        .iter()
        .filter(|r| r.cost.is_none())
        .map(|r| r.sku)
        .collect();
    let mut report = BackfillReport {
        rows: records.len(),
        missing: missing.len(),
        filled: 0,
    };
    if missing.is_empty() {
        info_time!("All {} bundles of {} have a cost", records.len(), config.game);
        return Ok(report);
    }
    info_time!("Backfilling {} of {} costs for {}", missing.len(), records.len(), config.game);

    let prober = Prober::new(storefront, config);
    let fetched = fetch_costs(&prober, &missing).await;
    report.filled = fetched.len();

    let merged = merge_costs(records, &fetched);
    spawn_blocking(move || rewrite_records(&path, &merged)).await??;

    info_time!(
        start_time,
        "Backfilled {} of {} missing costs for {}",
        report.filled,
        report.missing,
        config.game
    );
    Ok(report)
}

/// Sequential price lookups; a failed sku is skipped and stays missing.
async fn fetch_costs(prober: &Prober, skus: &[Sku]) -> HashMap<Sku, u64> {
    let mut progress = Progress::new(skus.len());
    let mut fetched = HashMap::with_capacity(skus.len());

    for &sku in skus {
        match prober.try_cost(sku).await {
            Ok(Some(cost)) => {
                fetched.insert(sku, cost);
            }
            Ok(None) => debug!(sku, game = prober.game(), "no cost listed"),
            Err(e) => warn!(sku, game = prober.game(), op = "backfill", kind = e.kind(), "{e}"),
        }
        if progress.advance() {
            info_time!("Backfill {}", progress);
        }
    }
    fetched
}

/// Left join of `fetched` onto `records` by sku; a fetched cost wins over the stored one.
fn merge_costs(records: Vec<BundleRecord>, fetched: &HashMap<Sku, u64>) -> Vec<BundleRecord> {
    records
        .into_iter()
        .map(|mut record| {
            if let Some(&cost) = fetched.get(&record.sku) {
                record.cost = Some(cost);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sku: Sku, cost: Option<u64>) -> BundleRecord {
        BundleRecord {
            title: format!("B{sku}"),
            url: format!("u{sku}"),
            sku,
            cost,
        }
    }

    #[test]
    fn merge_keeps_order_and_prior_costs() {
        let fetched = HashMap::from([(1, 9), (3, 4)]);
        let merged = merge_costs(vec![record(2, Some(5)), record(1, None), record(4, None)], &fetched);
        assert_eq!(merged, vec![record(2, Some(5)), record(1, Some(9)), record(4, None)]);
    }
}
