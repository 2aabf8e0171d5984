//! The per game discovery store: a csv file with `title,url,sku,cost` columns.
//!
//! While discovery runs, only the writer task spawned by [`spawn_writer`]
//! touches the file, so appends from concurrent probes never interleave.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;
use tokio::{sync::mpsc, task::spawn_blocking, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::model::{BundleRecord, Sku};
use crate::{info_time, Error, Result};

/// Skus already recorded in the store at `path`.
///
/// A missing store yields an empty set. So does a malformed one, after logging it:
/// the worst outcome is re-probing skus that were already found.
pub fn known_skus(path: &Path) -> HashSet<Sku> {
    if !path.exists() {
        debug!(path = %path.display(), "no store yet");
        return HashSet::new();
    }
    match read_skus(path) {
        Ok(skus) => skus,
        Err(e) => {
            warn!(path = %path.display(), op = "known_skus", kind = e.kind(), "treating store as absent: {e}");
            HashSet::new()
        }
    }
}

fn read_skus(path: &Path) -> Result<HashSet<Sku>> {
    // Only the sku column matters, ragged rows elsewhere are fine.
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let sku_idx = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == "sku")
        .ok_or_else(|| malformed(path, "no `sku` column"))?;

    let mut skus = HashSet::new();
    for row in reader.records() {
        let row = row?;
        let field = row.get(sku_idx).unwrap_or_default().trim();
        let sku = field
            .parse::<Sku>()
            .map_err(|_| malformed(path, format!("sku `{field}` on line {}", line_of(&row))))?;
        skus.insert(sku);
    }
    Ok(skus)
}

fn line_of(row: &csv::StringRecord) -> u64 {
    row.position().map(|p| p.line()).unwrap_or(0)
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::StoreMalformed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Appends `records` to the store, writing the header first if the store is new or empty.
///
/// Rows follow the columns of an existing store's header, so a store without a
/// `cost` column stays rectangular until the backfill rewrites it.
pub fn append_records(path: &Path, records: &[BundleRecord]) -> Result<()> {
    let columns = existing_columns(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let Some(columns) = columns else {
        let mut writer = csv::Writer::from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        return Ok(());
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for record in records {
        writer.write_record(columns.iter().map(|column| field_of(record, column)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Header of the store, or `None` if there is no store yet or it is empty.
fn existing_columns(path: &Path) -> Result<Option<csv::StringRecord>> {
    let is_empty = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if is_empty {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    Ok(Some(reader.headers()?.clone()))
}

fn field_of(record: &BundleRecord, column: &str) -> String {
    match column.trim() {
        "title" => record.title.clone(),
        "url" => record.url.clone(),
        "sku" => record.sku.to_string(),
        "cost" => record.cost.map(|c| c.to_string()).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Reads every row of the store. A missing `cost` column, a short row or a cost
/// that isn't a whole number all read as an absent cost.
pub fn load_records(path: &Path) -> Result<Vec<BundleRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| malformed(path, format!("no `{name}` column")))
    };
    let (title_idx, url_idx, sku_idx) = (column("title")?, column("url")?, column("sku")?);
    let cost_idx = column("cost").ok();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let field = |idx: usize| row.get(idx).unwrap_or_default().trim();
        let sku = field(sku_idx)
            .parse::<Sku>()
            .map_err(|_| malformed(path, format!("sku `{}` on line {}", field(sku_idx), line_of(&row))))?;
        records.push(BundleRecord {
            title: field(title_idx).to_string(),
            url: field(url_idx).to_string(),
            sku,
            cost: cost_idx.and_then(|idx| field(idx).parse().ok()),
        });
    }
    Ok(records)
}

/// Replaces the store with `records`.
///
/// The rows go to a temporary file next to the store which is then renamed over it,
/// so a failed rewrite leaves the previous version in place. The store keeps its
/// permissions.
pub fn rewrite_records(path: &Path, records: &[BundleRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;

    let mut writer = csv::Writer::from_writer(tmp.as_file());
    for record in records {
        writer.serialize(record)?;
    }
    // An empty record set would otherwise leave a headerless file.
    if records.is_empty() {
        writer.write_record(["title", "url", "sku", "cost"])?;
    }
    writer.flush()?;
    drop(writer);

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Spawns the single writer of the store. Every record received is appended and
/// flushed before the next one is taken. Resolves to the number of rows written
/// once all senders are dropped.
pub fn spawn_writer(
    path: PathBuf,
    game: String,
    record_rx: mpsc::Receiver<BundleRecord>,
) -> JoinHandle<usize> {
    tokio::spawn(async move { write_records(path, game, record_rx).await })
}

async fn write_records(path: PathBuf, game: String, mut record_rx: mpsc::Receiver<BundleRecord>) -> usize {
    let start_time = Local::now();
    let mut written = 0;

    while let Some(record) = record_rx.recv().await {
        let sku = record.sku;
        let res = spawn_blocking({
            let path = path.clone();
            move || append_records(&path, std::slice::from_ref(&record))
        })
        .await
        .map_err(Error::from)
        .and_then(|res| res);

        match res {
            Ok(()) => {
                written += 1;
                debug!(sku, game = %game, "recorded bundle");
            }
            Err(e) => {
                error!(sku, game = %game, op = "persist", kind = e.kind(), "bundle dropped for this run: {e}")
            }
        }
    }

    info_time!(start_time, "Writer done, {} new rows in {}", written, path.display());
    written
}

/// Creates the data directory and checks stores can be written to it.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!("data dir {} is not usable: {e}", dir.display()))
    })?;
    let probe = NamedTempFile::new_in(dir)
        .map_err(|e| Error::Config(format!("data dir {} is not writable: {e}", dir.display())))?;
    drop(probe);
    Ok(())
}
