//! Pyramidal-time snapshot archive.
//!
//! After every density pass the engine captures deep copies of the
//! population. Retention is multi-resolution: a pass at timestamp `t` lands
//! in tier `ℓ`, the largest order `≤ L` such that `t` is divisible by `α^ℓ`,
//! and each tier keeps only its `α + 1` most recent entries. Recent history
//! stays dense, deep history gets sparse, and the whole archive is bounded
//! by `(L + 1) · (α + 1)` snapshots.

use std::collections::BTreeMap;

use tracing::debug;

use super::density::FinalCluster;
use super::microcluster::MicroCluster;

/// One captured population, immutable after capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Timestamp of the density pass that produced this snapshot.
    pub timestamp: u64,
    /// Final clusters emitted by the pass.
    pub clusters: Vec<FinalCluster>,
    /// Copies of the labeled active microclusters.
    pub labeled: Vec<MicroCluster>,
    /// Copies of the entire live population (active and outlier).
    pub population: Vec<MicroCluster>,
}

/// Tiered archive of snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base: u64,
    orders: u32,
    tiers: BTreeMap<u32, BTreeMap<u64, Snapshot>>,
}

impl SnapshotStore {
    pub(crate) fn new(base: u64, orders: u32) -> Self {
        Self {
            base,
            orders,
            tiers: BTreeMap::new(),
        }
    }

    /// The tier a pass at timestamp `t` belongs to: the largest `ℓ <= L`
    /// with `t % base^ℓ == 0` (`t = 0` lands in the top tier).
    pub fn tier_of(&self, t: u64) -> u32 {
        for order in (1..=self.orders).rev() {
            if let Some(p) = self.base.checked_pow(order) {
                if t % p == 0 {
                    return order;
                }
            }
        }
        0
    }

    pub(crate) fn record(&mut self, snapshot: Snapshot) {
        let t = snapshot.timestamp;
        let tier = self.tier_of(t);
        let keep = (self.base + 1) as usize;
        let entries = self.tiers.entry(tier).or_default();
        entries.insert(t, snapshot);
        while entries.len() > keep {
            if let Some((evicted, _)) = entries.pop_first() {
                debug!(tier, evicted, "snapshot retention evicted oldest");
            }
        }
        debug!(tier, timestamp = t, "snapshot captured");
    }

    /// Total number of retained snapshots.
    pub fn len(&self) -> usize {
        self.tiers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots retained in one tier, oldest first.
    pub fn tier(&self, order: u32) -> impl Iterator<Item = &Snapshot> {
        self.tiers.get(&order).into_iter().flat_map(BTreeMap::values)
    }

    /// All retained snapshots, ascending timestamp (tiers interleaved).
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        let mut all: Vec<&Snapshot> = self
            .tiers
            .values()
            .flat_map(BTreeMap::values)
            .collect();
        all.sort_by_key(|s| s.timestamp);
        all.into_iter()
    }

    /// The retained snapshot with the greatest timestamp at or before `t`.
    pub fn nearest(&self, t: u64) -> Option<&Snapshot> {
        self.tiers
            .values()
            .filter_map(|entries| entries.range(..=t).next_back())
            .max_by_key(|(ts, _)| **ts)
            .map(|(_, s)| s)
    }

    /// The most recent retained snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.nearest(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(t: u64) -> Snapshot {
        Snapshot {
            timestamp: t,
            clusters: Vec::new(),
            labeled: Vec::new(),
            population: Vec::new(),
        }
    }

    #[test]
    fn tier_is_the_largest_dividing_order() {
        let store = SnapshotStore::new(2, 3);
        assert_eq!(store.tier_of(9), 0);
        assert_eq!(store.tier_of(14), 1);
        assert_eq!(store.tier_of(4), 2);
        assert_eq!(store.tier_of(24), 3);
        // Capped at L even for deeper powers, and 0 divides everything.
        assert_eq!(store.tier_of(64), 3);
        assert_eq!(store.tier_of(0), 3);
    }

    #[test]
    fn each_tier_keeps_the_most_recent_entries() {
        // Pass timestamps as the engine produces them with t_global = 5.
        let mut store = SnapshotStore::new(2, 3);
        for t in (4..100).step_by(5) {
            store.record(snap(t));
        }

        let tier0: Vec<u64> = store.tier(0).map(|s| s.timestamp).collect();
        let tier1: Vec<u64> = store.tier(1).map(|s| s.timestamp).collect();
        let tier2: Vec<u64> = store.tier(2).map(|s| s.timestamp).collect();
        let tier3: Vec<u64> = store.tier(3).map(|s| s.timestamp).collect();
        assert_eq!(tier0, vec![79, 89, 99]);
        assert_eq!(tier1, vec![54, 74, 94]);
        assert_eq!(tier2, vec![4, 44, 84]);
        assert_eq!(tier3, vec![24, 64]);
        assert_eq!(store.len(), 11);
    }

    #[test]
    fn capacity_is_bounded() {
        let (alpha, l) = (2u64, 3u32);
        let mut store = SnapshotStore::new(alpha, l);
        for t in 0..10_000 {
            store.record(snap(t));
        }
        assert!(store.len() <= ((l + 1) as usize) * ((alpha + 1) as usize));
    }

    #[test]
    fn nearest_walks_all_tiers() {
        let mut store = SnapshotStore::new(2, 3);
        for t in (4..100).step_by(5) {
            store.record(snap(t));
        }
        assert_eq!(store.nearest(1_000).map(|s| s.timestamp), Some(99));
        assert_eq!(store.nearest(99).map(|s| s.timestamp), Some(99));
        assert_eq!(store.nearest(98).map(|s| s.timestamp), Some(94));
        // 4 is the oldest retained timestamp (tier 2).
        assert_eq!(store.nearest(25).map(|s| s.timestamp), Some(24));
        assert_eq!(store.nearest(3), None);
        assert_eq!(store.latest().map(|s| s.timestamp), Some(99));
    }

    #[test]
    fn same_timestamp_recaptures_replace() {
        let mut store = SnapshotStore::new(2, 3);
        store.record(snap(8));
        store.record(snap(8));
        assert_eq!(store.len(), 1);
    }
}
