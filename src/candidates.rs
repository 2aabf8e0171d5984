use std::collections::HashSet;

use crate::model::{Direction, Sku};

/// Skus of `start..stop` not yet in `known`, in the requested direction.
/// Descending walks the same range from `stop - 1` down to `start`.
pub fn candidates(start: Sku, stop: Sku, direction: Direction, known: &HashSet<Sku>) -> Vec<Sku> {
    let range = start..stop;
    let unknown = |sku: &Sku| !known.contains(sku);
    match direction {
        Direction::Ascending => range.filter(unknown).collect(),
        Direction::Descending => range.rev().filter(unknown).collect(),
    }
}
