use std::fmt;

use serde::Serialize;

/// Numeric storefront identifier of a bundle.
pub type Sku = u64;

/// One row of the discovery store. Column order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleRecord {
    pub title: String,
    pub url: String,
    pub sku: Sku,
    pub cost: Option<u64>,
}

/// Result of probing a single sku.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found(BundleRecord),
    NotFound,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Completed/total counter reported while a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { done: 0, total }
    }

    /// Bumps the counter and returns true when a 10% step (or the end) was crossed.
    pub fn advance(&mut self) -> bool {
        self.done += 1;
        let step = (self.total / 10).max(1);
        self.done == self.total || self.done % step == 0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        };
        write!(f, "{}/{} ({pct:.1}%)", self.done, self.total)
    }
}
