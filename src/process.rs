use std::sync::Arc;

use chrono::Local;
use tokio::{
    sync::{mpsc, Semaphore},
    task::{spawn_blocking, JoinSet},
};
use tracing::{debug, error};

use crate::candidates::candidates;
use crate::config::Config;
use crate::model::{BundleRecord, ProbeOutcome, Progress, Sku};
use crate::probe::Prober;
use crate::request::Storefront;
use crate::store::{known_skus, spawn_writer};
use crate::{info_time, Result};

/// Tally of one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Candidates probed, known skus excluded.
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
    /// Rows actually appended to the store.
    pub persisted: usize,
}

/// Probes every unknown sku of the configured range and appends found bundles to the store.
pub async fn run_discovery(config: &Config, storefront: Arc<dyn Storefront>) -> Result<DiscoveryReport> {
    let start_time = Local::now();
    let path = config.store_path();
    info_time!("Started probing {} in {}..{}", config.game, config.start, config.stop);

    let known = spawn_blocking({
        let path = path.clone();
        move || known_skus(&path)
    })
    .await?;
    let skus = candidates(config.start, config.stop, config.direction, &known);
    info_time!(
        "{} skus already recorded, {} left to probe",
        known.len(),
        skus.len()
    );

    let (record_tx, record_rx) = mpsc::channel(256);
    let writer_handle = spawn_writer(path, config.game.clone(), record_rx);

    let prober = Prober::new(storefront, config);
    let mut report = probe_all(prober, skus, config.workers, record_tx).await;
    // All senders are gone once probe_all returns, so the writer drains and stops.
    report.persisted = writer_handle.await?;

    info_time!(
        start_time,
        "Finished probing {}: {} found, {} not found, {} errors, {} recorded",
        config.game,
        report.found,
        report.not_found,
        report.errors,
        report.persisted
    );
    Ok(report)
}

/// Runs the prober over `skus` with at most `workers` probes in flight, handing every
/// found bundle to the writer as soon as its probe completes.
async fn probe_all(
    prober: Prober,
    skus: Vec<Sku>,
    workers: usize,
    record_tx: mpsc::Sender<BundleRecord>,
) -> DiscoveryReport {
    let start_time = Local::now();
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut report = DiscoveryReport {
        total: skus.len(),
        ..Default::default()
    };
    let mut progress = Progress::new(skus.len());

    let mut task_set = JoinSet::new();
    for sku in skus {
        task_set.spawn({
            let prober = prober.clone();
            let semaphore = semaphore.clone();
            let record_tx = record_tx.clone();

            async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (sku, ProbeOutcome::Error("worker pool closed".into()));
                };
                let outcome = prober.probe(sku).await;
                if let ProbeOutcome::Found(record) = &outcome {
                    if let Err(e) = record_tx.send(record.clone()).await {
                        error!(sku, game = prober.game(), op = "persist", "writer is gone: {e}");
                    }
                }
                (sku, outcome)
            }
        });
    }
    drop(record_tx);

    // Completions arrive in finishing order.
    while let Some(task) = task_set.join_next().await {
        match task {
            Ok((_, ProbeOutcome::Found(_))) => report.found += 1,
            Ok((_, ProbeOutcome::NotFound)) => report.not_found += 1,
            Ok((sku, ProbeOutcome::Error(_))) => {
                report.errors += 1;
                debug!(sku, "left for the next run");
            }
            Err(e) => {
                report.errors += 1;
                error!(game = prober.game(), op = "probe", kind = "runtime", "probe task failed: {e}");
            }
        }

        if progress.advance() {
            info_time!(start_time, "Probed {}", progress);
        } else {
            debug!(%progress, "probed");
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::Error;

    struct CountingStore {
        pages: HashMap<Sku, String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Storefront for CountingStore {
        async fn detail_page(&self, sku: Sku, _game: &str) -> Result<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.pages.get(&sku).cloned())
        }

        async fn inventory(&self, sku: Sku, _game: &str) -> Result<String> {
            Err(Error::ParseMissingField { sku, field: "inventory" })
        }

        fn detail_url(&self, sku: Sku, game: &str) -> String {
            format!("fake://{game}/{sku}")
        }
    }

    #[tokio::test]
    async fn worker_cap_bounds_in_flight_probes() {
        let pages = (0..30)
            .filter(|sku| sku % 3 == 0)
            .map(|sku| (sku, format!("<title>B{sku} | My Call of Duty® Bundles</title>")))
            .collect();
        let store = Arc::new(CountingStore {
            pages,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new("vg", 0, 30, dir.path());
        config.workers = 4;

        let report = run_discovery(&config, store.clone()).await.unwrap();

        assert!(store.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(
            report,
            DiscoveryReport {
                total: 30,
                found: 10,
                not_found: 20,
                errors: 0,
                persisted: 10,
            }
        );
    }
}
