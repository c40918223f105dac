//! Fractional order keys for sibling placement
//!
//! Every item in a sibling set carries an [`OrderKey`]. New keys are derived
//! from the neighbours at the insertion point (midpoint, or one step past the
//! extreme sibling), so a drag/drop only ever rewrites the moved item.
//!
//! Bisection eventually runs out of `f64` precision. [`between`] reports that
//! by returning `None`; callers then renumber the sibling set with
//! [`renumber`] and derive the key again.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Distance between keys produced by appends, prepends and renumbering.
pub const ORDER_STEP: f64 = 1000.0;

/// A totally ordered sibling position.
///
/// Serializes as a bare number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderKey(f64);

impl OrderKey {
    /// Wrap a raw key value.
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// The key given to the first item of an empty sibling set.
    pub fn first() -> Self {
        Self(ORDER_STEP)
    }

    /// The raw key value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for OrderKey {
    fn default() -> Self {
        Self::first()
    }
}

impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for OrderKey {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive a key strictly between `low` and `high`.
///
/// A missing bound means "no neighbour on that side": the key is placed one
/// [`ORDER_STEP`] past the present neighbour, or at [`OrderKey::first`] when
/// both are missing.
///
/// Returns `None` when no representable key lies strictly between the bounds,
/// which covers precision exhaustion, colliding bounds and inverted bounds.
pub fn between(low: Option<OrderKey>, high: Option<OrderKey>) -> Option<OrderKey> {
    let candidate = match (low, high) {
        (None, None) => return Some(OrderKey::first()),
        (Some(l), None) => l.0 + ORDER_STEP,
        (None, Some(h)) => h.0 - ORDER_STEP,
        (Some(l), Some(h)) => {
            if l >= h {
                return None;
            }
            // Halving the gap first keeps the sum from overflowing at the extremes.
            l.0 + (h.0 - l.0) / 2.0
        }
    };

    if !candidate.is_finite() {
        return None;
    }
    let above_low = low.map_or(true, |l| candidate > l.0);
    let below_high = high.map_or(true, |h| candidate < h.0);
    (above_low && below_high).then_some(OrderKey(candidate))
}

/// Key for an item placed after every key in `keys`.
pub fn append(keys: &[OrderKey]) -> Option<OrderKey> {
    between(keys.iter().copied().max(), None)
}

/// Key for an item placed before every key in `keys`.
pub fn prepend(keys: &[OrderKey]) -> Option<OrderKey> {
    between(None, keys.iter().copied().min())
}

/// Key for inserting at `index` into an ascending key sequence, i.e. directly
/// before `sorted[index]` (or at the end when `index == sorted.len()`).
pub fn insertion_key(sorted: &[OrderKey], index: usize) -> Option<OrderKey> {
    let index = index.min(sorted.len());
    let low = index.checked_sub(1).map(|i| sorted[i]);
    let high = sorted.get(index).copied();
    between(low, high)
}

/// Fresh keys for `count` siblings: `ORDER_STEP`, `2 * ORDER_STEP`, ...
pub fn renumber(count: usize) -> Vec<OrderKey> {
    (1..=count).map(|i| OrderKey(i as f64 * ORDER_STEP)).collect()
}

/// True when the keys are strictly ascending (sorted with no collisions).
pub fn is_strictly_ascending(keys: &[OrderKey]) -> bool {
    keys.windows(2).all(|w| w[0] < w[1])
}
