//! Periodic density stage: classification and final-cluster assembly.
//!
//! The stage is a batch pass over the live microcluster population, run every
//! `t_global` samples and once at stream end. It never looks at raw samples;
//! the sufficient statistics carried by the microclusters are enough.
//!
//! # Steps
//!
//! 1. **Classify.** Recompute each density as `n / V` where `V` is the
//!    hyperbox volume. With `mean` and `max` over the live population, the
//!    thresholds are `D_hi = mean + (max - mean) / 2` and `D_lo = mean`:
//!    at or above `D_hi` is Dense, in `[D_lo, D_hi)` is Semi-Dense, below is
//!    Low-Density. The active set A is Dense ∪ Semi-Dense, the outlier set O
//!    the rest. Labels reset on every pass.
//!
//! 2. **Label by connectivity.** Dense microclusters, in order of
//!    descending density (ties by ascending id), seed a BFS over *face*
//!    adjacency within A. Dense members propagate the expansion; semi-dense
//!    members take the label but act as a boundary and do not propagate.
//!    Semi-dense microclusters reachable only from other semi-dense ones
//!    stay unclassed. O never participates.
//!
//! 3. **Emit.** Each label becomes a [`FinalCluster`] with the
//!    density-weighted centroid of its members, their mean density, and the
//!    maximum Manhattan distance from the centroid to a member center.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info};

use super::context::Context;
use super::grid::GridIndex;
use super::microcluster::{DensityType, MicroCluster};
use super::util;

/// Sentinel for unclassed microclusters when flattening `Option<usize>`
/// labels to plain `usize` (`label.unwrap_or(UNCLASSED)`).
pub const UNCLASSED: usize = usize::MAX;

/// A final cluster derived by one density pass.
///
/// Labels are re-issued from 1 on every pass; correlating clusters across
/// passes goes through snapshots, not label identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalCluster {
    /// Cluster label (`>= 1`).
    pub label: usize,
    /// Density-weighted centroid of the member centers.
    pub center: Vec<f32>,
    /// Mean density of the members.
    pub density: f64,
    /// Maximum Manhattan distance from the centroid to a member center.
    pub spread: f32,
    /// Ids of the member microclusters, ascending.
    pub members: Vec<u64>,
}

/// Result of one density pass.
pub(crate) struct PassOutcome {
    pub clusters: Vec<FinalCluster>,
    pub active: BTreeSet<u64>,
    pub outliers: BTreeSet<u64>,
}

impl PassOutcome {
    fn empty() -> Self {
        Self {
            clusters: Vec::new(),
            active: BTreeSet::new(),
            outliers: BTreeSet::new(),
        }
    }
}

/// Run one density pass over the live population.
///
/// An empty population yields an empty outcome; it is not an error.
pub(crate) fn run_pass(pool: &mut BTreeMap<u64, MicroCluster>, ctx: &Context) -> PassOutcome {
    if pool.is_empty() {
        return PassOutcome::empty();
    }

    let volume = ctx.hyperbox_volume();
    let mut sum = 0.0f64;
    let mut max = f64::MIN;
    for uc in pool.values_mut() {
        let d = uc.recompute_density(volume);
        sum += d;
        max = max.max(d);
    }
    let mean = sum / pool.len() as f64;
    let d_hi = mean + (max - mean) / 2.0;
    let d_lo = mean;
    debug!(population = pool.len(), d_lo, d_hi, "density thresholds");

    // Step 1: classify, rebuild A/O, reset labels.
    let mut active = BTreeSet::new();
    let mut outliers = BTreeSet::new();
    let mut dense = Vec::new();
    for uc in pool.values_mut() {
        let d = uc.density();
        let class = if d >= d_hi {
            DensityType::Dense
        } else if d >= d_lo {
            DensityType::SemiDense
        } else {
            DensityType::LowDensity
        };
        uc.set_density_type(class);
        uc.set_label(None);
        if class.is_active() {
            active.insert(uc.id());
        } else {
            outliers.insert(uc.id());
        }
        if class == DensityType::Dense {
            dense.push((uc.id(), d));
        }
    }

    // Step 2: label by face connectivity, seeded at the densest first.
    let mut occupied = GridIndex::new();
    for id in &active {
        occupied.insert(pool[id].address().clone(), *id);
    }
    dense.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut next_label = 0usize;
    for &(seed, _) in &dense {
        if pool[&seed].label().is_some() {
            continue;
        }
        next_label += 1;
        pool.get_mut(&seed).expect("seed is live").set_label(Some(next_label));

        let mut queue = VecDeque::from([seed]);
        while let Some(u) = queue.pop_front() {
            let addr = pool[&u].address().clone();
            for v in occupied.face_neighbors(&addr, ctx) {
                let uc = pool.get_mut(&v).expect("grid refers to live ids");
                if uc.label().is_some() {
                    continue;
                }
                uc.set_label(Some(next_label));
                // Semi-dense members take the label but do not extend it.
                if uc.density_type() == DensityType::Dense {
                    queue.push_back(v);
                }
            }
        }
    }

    // Step 3: emit final clusters.
    let pool = &*pool;
    let mut members_by_label: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
    for id in &active {
        if let Some(label) = pool[id].label() {
            members_by_label.entry(label).or_default().push(*id);
        }
    }
    let clusters: Vec<FinalCluster> = members_by_label
        .into_iter()
        .map(|(label, members)| summarize(label, members, pool))
        .collect();

    info!(
        population = pool.len(),
        dense = dense.len(),
        active = active.len(),
        outliers = outliers.len(),
        clusters = clusters.len(),
        "density pass complete"
    );

    PassOutcome {
        clusters,
        active,
        outliers,
    }
}

fn summarize(label: usize, members: Vec<u64>, pool: &BTreeMap<u64, MicroCluster>) -> FinalCluster {
    let dims = pool[&members[0]].address().len();
    let mut weighted = vec![0.0f64; dims];
    let mut weight = 0.0f64;
    let mut density_sum = 0.0f64;
    for id in &members {
        let uc = &pool[id];
        let d = uc.density();
        for (acc, c) in weighted.iter_mut().zip(uc.center()) {
            *acc += d * f64::from(c);
        }
        weight += d;
        density_sum += d;
    }
    let center: Vec<f32> = weighted.iter().map(|&w| (w / weight) as f32).collect();

    let spread = members
        .iter()
        .map(|id| util::manhattan(&center, &pool[id].center()))
        .fold(0.0f32, f32::max);

    FinalCluster {
        label,
        center,
        density: density_sum / members.len() as f64,
        spread,
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Seed a microcluster holding `n` samples at `point`.
    fn seed(pool: &mut BTreeMap<u64, MicroCluster>, ctx: &Context, id: u64, point: &[f32], n: u64) {
        let mut uc = MicroCluster::new(id, point, 0, ctx);
        for _ in 1..n {
            uc.assimilate(point, 0, ctx);
        }
        pool.insert(id, uc);
    }

    fn labels(pool: &BTreeMap<u64, MicroCluster>) -> Vec<(u64, Option<usize>)> {
        pool.values().map(|uc| (uc.id(), uc.label())).collect()
    }

    /// 1-D context with unit-sized cells.
    fn line_ctx() -> Context {
        Context::new(1.0 / 30.0, &[(0.0, 30.0)]).unwrap()
    }

    #[test]
    fn empty_population_is_not_fatal() {
        let ctx = line_ctx();
        let mut pool = BTreeMap::new();
        let outcome = run_pass(&mut pool, &ctx);
        assert!(outcome.clusters.is_empty());
        assert!(outcome.active.is_empty());
        assert!(outcome.outliers.is_empty());
    }

    #[test]
    fn thresholds_partition_the_population() {
        // Counts 12, 9, 9, 12, 1, 1: mean 44/6 ≈ 7.33, D_hi ≈ 9.67.
        let ctx = line_ctx();
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5], 12);
        seed(&mut pool, &ctx, 1, &[1.5], 9);
        seed(&mut pool, &ctx, 2, &[2.5], 9);
        seed(&mut pool, &ctx, 3, &[3.5], 12);
        seed(&mut pool, &ctx, 4, &[10.5], 1);
        seed(&mut pool, &ctx, 5, &[20.5], 1);

        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(pool[&0].density_type(), DensityType::Dense);
        assert_eq!(pool[&1].density_type(), DensityType::SemiDense);
        assert_eq!(pool[&2].density_type(), DensityType::SemiDense);
        assert_eq!(pool[&3].density_type(), DensityType::Dense);
        assert_eq!(pool[&4].density_type(), DensityType::LowDensity);
        assert_eq!(pool[&5].density_type(), DensityType::LowDensity);

        let active: Vec<u64> = outcome.active.iter().copied().collect();
        let outliers: Vec<u64> = outcome.outliers.iter().copied().collect();
        assert_eq!(active, vec![0, 1, 2, 3]);
        assert_eq!(outliers, vec![4, 5]);
    }

    #[test]
    fn semi_dense_takes_a_label_but_does_not_propagate() {
        // Dense-semi-semi-dense chain: the middle semis belong to different
        // clusters because neither extends the frontier.
        let ctx = line_ctx();
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5], 12);
        seed(&mut pool, &ctx, 1, &[1.5], 9);
        seed(&mut pool, &ctx, 2, &[2.5], 9);
        seed(&mut pool, &ctx, 3, &[3.5], 12);
        seed(&mut pool, &ctx, 4, &[10.5], 1);
        seed(&mut pool, &ctx, 5, &[20.5], 1);

        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(outcome.clusters.len(), 2);
        assert_eq!(outcome.clusters[0].members, vec![0, 1]);
        assert_eq!(outcome.clusters[1].members, vec![2, 3]);
        assert_eq!(pool[&4].label(), None);
        assert_eq!(pool[&5].label(), None);
    }

    #[test]
    fn isolated_dense_forms_a_singleton_and_semi_pairs_stay_unclassed() {
        // One dense microcluster far from a semi-dense pair: the pair has no
        // dense seed to inherit from.
        let ctx = line_ctx();
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5], 12);
        seed(&mut pool, &ctx, 1, &[20.5], 1);
        seed(&mut pool, &ctx, 2, &[10.5], 9);
        seed(&mut pool, &ctx, 3, &[11.5], 9);

        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].members, vec![0]);
        assert!(outcome.active.contains(&2) && outcome.active.contains(&3));
        assert_eq!(pool[&2].label(), None);
        assert_eq!(pool[&3].label(), None);
    }

    #[test]
    fn corner_contact_does_not_connect() {
        let ctx = Context::new(1.0 / 12.0, &[(0.0, 12.0), (0.0, 12.0)]).unwrap();
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5, 0.5], 5);
        seed(&mut pool, &ctx, 1, &[1.5, 1.5], 5);

        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(outcome.clusters.len(), 2);

        // Face contact does connect.
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5, 0.5], 5);
        seed(&mut pool, &ctx, 1, &[0.5, 1.5], 5);
        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].members, vec![0, 1]);
    }

    #[test]
    fn face_adjacency_preserves_ring_topology() {
        // Two concentric square rings of equally dense cells. Every member is
        // Dense (uniform density), and each ring is one face-connected cycle,
        // so exactly two clusters come out - a centroid method would shred
        // both.
        let ctx = Context::new(1.0 / 12.0, &[(0.0, 12.0), (0.0, 12.0)]).unwrap();
        let mut pool = BTreeMap::new();
        let mut id = 0u64;
        let mut inner = Vec::new();
        let mut outer = Vec::new();
        for i in 4..=7i64 {
            for j in 4..=7i64 {
                if i == 4 || i == 7 || j == 4 || j == 7 {
                    seed(&mut pool, &ctx, id, &[i as f32 + 0.5, j as f32 + 0.5], 5);
                    inner.push(id);
                    id += 1;
                }
            }
        }
        for i in 1..=10i64 {
            for j in 1..=10i64 {
                if i == 1 || i == 10 || j == 1 || j == 10 {
                    seed(&mut pool, &ctx, id, &[i as f32 + 0.5, j as f32 + 0.5], 5);
                    outer.push(id);
                    id += 1;
                }
            }
        }

        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(outcome.clusters.len(), 2);
        assert_eq!(outcome.clusters[0].members, inner);
        assert_eq!(outcome.clusters[1].members, outer);
    }

    #[test]
    fn reclassification_is_idempotent() {
        let ctx = line_ctx();
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5], 12);
        seed(&mut pool, &ctx, 1, &[1.5], 9);
        seed(&mut pool, &ctx, 2, &[2.5], 9);
        seed(&mut pool, &ctx, 3, &[3.5], 12);
        seed(&mut pool, &ctx, 4, &[10.5], 1);

        run_pass(&mut pool, &ctx);
        let first = labels(&pool);
        run_pass(&mut pool, &ctx);
        assert_eq!(first, labels(&pool));
    }

    #[test]
    fn summary_statistics_are_density_weighted() {
        // Two far-off singletons drag the mean low enough that the count-9
        // cell classifies semi-dense.
        let ctx = line_ctx();
        let mut pool = BTreeMap::new();
        seed(&mut pool, &ctx, 0, &[0.5], 12);
        seed(&mut pool, &ctx, 1, &[1.5], 9);
        seed(&mut pool, &ctx, 2, &[10.5], 1);
        seed(&mut pool, &ctx, 3, &[20.5], 1);

        let outcome = run_pass(&mut pool, &ctx);
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].members, vec![0, 1]);
        let fc = &outcome.clusters[0];
        // Weighted center: (12*0.5 + 9*1.5) / 21.
        assert!((fc.center[0] - 0.928_571_4).abs() < 1e-4);
        assert!((fc.spread - (1.5 - 0.928_571_4)).abs() < 1e-4);
        let volume = ctx.hyperbox_volume();
        assert!((fc.density - 10.5 / volume).abs() < 1e-3);
    }
}
