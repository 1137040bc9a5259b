//! DyClee engine facade: the online distance stage plus the periodic driver.
//!
//! # The Algorithm (Barbosa Roa et al., 2019)
//!
//! DyClee clusters an evolving stream in two decoupled stages:
//!
//! 1. **Distance stage**, per sample: route the sample to the nearest
//!    reachable microcluster (Moore neighborhood on the hyperbox grid) or
//!    spawn a new one; maintain sufficient statistics and the grid index;
//!    evict outliers untouched for a full period.
//! 2. **Density stage**, every `t_global` samples: reclassify the population
//!    by global density thresholds and assemble final clusters by face
//!    connectivity (see [`super::density`]).
//!
//! The split is what makes the engine cheap online: per-sample work is
//! `O(3^d)` grid probes, and the batch pass amortizes to a constant per
//! sample.
//!
//! ## Merge on re-address
//!
//! Assimilation moves a microcluster's center, which can carry it across a
//! cell boundary into an occupied cell. The older microcluster (earlier
//! `t_start`) absorbs the younger, and absorption itself can move the
//! survivor again, so placement loops until the survivor lands in a free
//! cell. Every round destroys one microcluster, which bounds the loop.
//!
//! ## When to Use
//!
//! - The stream's generating process drifts, appears, or fades over time
//! - Clusters have non-convex shapes (face connectivity, not centroids)
//! - You need bounded memory over an unbounded stream
//!
//! ## References
//!
//! Barbosa Roa, Travé-Massuyès, Grisales (2019). "DyClee: Dynamic clustering
//! for tracking evolving environments." Pattern Recognition 94, 162-186.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use super::context::{Context, GridAddress};
use super::density::{self, FinalCluster};
use super::grid::GridIndex;
use super::microcluster::MicroCluster;
use super::snapshot::{Snapshot, SnapshotStore};
use super::traits::StreamClustering;
use super::util;
use crate::error::{Error, Result};

/// Engine parameters.
#[derive(Clone, Debug)]
pub struct DyCleeParams {
    /// Period of the density stage in samples, and the staleness horizon for
    /// outlier eviction.
    ///
    /// `None` selects batch mode: no periodic pass and no eviction during
    /// ingestion; [`DyClee::run_dataset`] substitutes the dataset length and
    /// [`DyClee::finalize`] always runs a terminal pass.
    pub t_global: Option<u64>,

    /// Base `α` of the pyramidal snapshot scheme.
    pub snapshot_base: u64,

    /// Order cap `L` of the pyramidal snapshot scheme.
    pub snapshot_orders: u32,
}

impl Default for DyCleeParams {
    fn default() -> Self {
        Self {
            t_global: None,
            snapshot_base: 2,
            snapshot_orders: 5,
        }
    }
}

impl DyCleeParams {
    fn validate(&self) -> Result<()> {
        if self.t_global == Some(0) {
            return Err(Error::BadConfig {
                name: "t_global",
                message: "must be at least 1",
            });
        }
        if self.snapshot_base == 0 {
            return Err(Error::BadConfig {
                name: "snapshot_base",
                message: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Online distance- and density-based stream clustering engine.
///
/// Single-threaded and cooperative: [`DyClee::ingest`] runs to completion
/// before the next sample. Microclusters are owned by the engine's pool; the
/// grid index and the active/outlier lists refer to them by id, and
/// snapshots hold independent deep copies.
#[derive(Debug, Clone)]
pub struct DyClee {
    context: Context,
    params: DyCleeParams,
    pool: BTreeMap<u64, MicroCluster>,
    grid: GridIndex,
    active: BTreeSet<u64>,
    outliers: BTreeSet<u64>,
    snapshots: SnapshotStore,
    clusters: Vec<FinalCluster>,
    /// Forwarding map for merged-away ids, youngest to survivor.
    merged: HashMap<u64, u64>,
    next_id: u64,
    last_t: Option<u64>,
    samples_seen: u64,
}

impl DyClee {
    /// Create an engine with default parameters.
    pub fn new(context: Context) -> Self {
        Self::with_params(context, DyCleeParams::default())
    }

    /// Create an engine with explicit parameters.
    pub fn with_params(context: Context, params: DyCleeParams) -> Self {
        let snapshots = SnapshotStore::new(params.snapshot_base.max(1), params.snapshot_orders);
        Self {
            context,
            params,
            pool: BTreeMap::new(),
            grid: GridIndex::new(),
            active: BTreeSet::new(),
            outliers: BTreeSet::new(),
            snapshots,
            clusters: Vec::new(),
            merged: HashMap::new(),
            next_id: 0,
            last_t: None,
            samples_seen: 0,
        }
    }

    /// Set the density-stage period (and eviction horizon).
    pub fn with_t_global(mut self, t_global: u64) -> Self {
        self.params.t_global = Some(t_global);
        self
    }

    /// Set the pyramidal snapshot base `α`.
    pub fn with_snapshot_base(mut self, base: u64) -> Self {
        self.params.snapshot_base = base;
        self.snapshots = SnapshotStore::new(base.max(1), self.params.snapshot_orders);
        self
    }

    /// Set the pyramidal snapshot order cap `L`.
    pub fn with_snapshot_orders(mut self, orders: u32) -> Self {
        self.params.snapshot_orders = orders;
        self.snapshots = SnapshotStore::new(self.params.snapshot_base.max(1), orders);
        self
    }

    /// Ingest one sample, returning the id of the microcluster that absorbed
    /// it.
    ///
    /// Timestamps must be monotonically non-decreasing. Samples with NaN or
    /// out-of-context coordinates are accepted (the grid extends
    /// conceptually); a periodic density pass fires every `t_global`
    /// ingested samples.
    pub fn ingest(&mut self, sample: &[f32], t: u64) -> Result<u64> {
        self.params.validate()?;
        if sample.len() != self.context.dims() {
            return Err(Error::DimensionMismatch {
                expected: self.context.dims(),
                found: sample.len(),
            });
        }
        if let Some(last) = self.last_t {
            if t < last {
                return Err(Error::OutOfOrder { last, given: t });
            }
        }
        self.last_t = Some(t);

        let id = self.distance_stage(sample, t);
        self.evict_stale(t);
        debug_assert_eq!(self.grid.len(), self.pool.len());

        self.samples_seen += 1;
        if let Some(g) = self.params.t_global {
            if self.samples_seen % g == 0 {
                self.density_pass(t);
            }
        }
        Ok(id)
    }

    /// Run a terminal density pass at the last seen timestamp and return the
    /// final clusters. Idempotent when no samples intervene.
    pub fn finalize(&mut self) -> Vec<FinalCluster> {
        let t = self.last_t.unwrap_or(0);
        self.density_pass(t);
        self.clusters.clone()
    }

    /// Convenience driver: ingest `data` with timestamps `0..n`, run a
    /// terminal density pass, and return the final label of the microcluster
    /// each sample was absorbed into (`None` = unclassed or evicted).
    ///
    /// If `t_global` is unset, the dataset length is used, so exactly one
    /// pass fires at the end.
    pub fn run_dataset(&mut self, data: &[Vec<f32>]) -> Result<Vec<Option<usize>>> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        if self.params.t_global.is_none() {
            self.params.t_global = Some(data.len() as u64);
        }
        let g = self.params.t_global.expect("just defaulted");

        let mut absorbed = Vec::with_capacity(data.len());
        for (i, row) in data.iter().enumerate() {
            absorbed.push(self.ingest(row, i as u64)?);
        }
        if self.samples_seen % g != 0 {
            self.density_pass(self.last_t.expect("ingested at least one sample"));
        }
        Ok(absorbed.into_iter().map(|id| self.label_of(id)).collect())
    }

    /// Final-cluster label of a microcluster id, following merge redirects.
    ///
    /// `None` for unclassed, evicted, or unknown ids.
    pub fn label_of(&self, id: u64) -> Option<usize> {
        let mut cur = id;
        loop {
            if let Some(uc) = self.pool.get(&cur) {
                return uc.label();
            }
            match self.merged.get(&cur) {
                Some(&next) => cur = next,
                None => return None,
            }
        }
    }

    /// The stream context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Engine parameters.
    pub fn params(&self) -> &DyCleeParams {
        &self.params
    }

    /// A live microcluster by id (no merge-redirect resolution).
    pub fn micro(&self, id: u64) -> Option<&MicroCluster> {
        self.pool.get(&id)
    }

    /// All live microclusters, ascending id.
    pub fn micros(&self) -> impl Iterator<Item = &MicroCluster> {
        self.pool.values()
    }

    /// Active (dense and semi-dense) microclusters as of the last pass.
    pub fn active(&self) -> impl Iterator<Item = &MicroCluster> {
        self.active.iter().map(move |id| &self.pool[id])
    }

    /// Outlier (low-density) microclusters as of the last pass.
    pub fn outliers(&self) -> impl Iterator<Item = &MicroCluster> {
        self.outliers.iter().map(move |id| &self.pool[id])
    }

    /// Final clusters emitted by the last density pass.
    pub fn clusters(&self) -> &[FinalCluster] {
        &self.clusters
    }

    /// The pyramidal snapshot archive.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    fn distance_stage(&mut self, sample: &[f32], t: u64) -> u64 {
        let addr = self.context.address(sample);
        let candidates = self.grid.moore_neighbors(&addr, &self.context);

        if candidates.is_empty() {
            let id = self.next_id;
            self.next_id += 1;
            let uc = MicroCluster::new(id, sample, t, &self.context);
            let displaced = self.grid.insert(uc.address().clone(), id);
            debug_assert!(displaced.is_none(), "spawn cell cannot be occupied");
            self.outliers.insert(id);
            self.pool.insert(id, uc);
            trace!(id, ?addr, "spawned microcluster");
            return id;
        }

        // Nearest center wins; ties go to the older microcluster.
        let mut best = candidates[0];
        let mut best_d2 = f32::INFINITY;
        for &cid in &candidates {
            let uc = &self.pool[&cid];
            debug_assert!(uc.reaches(sample, &self.context));
            let d2 = util::squared_euclidean(&uc.center(), sample);
            let better = match d2.total_cmp(&best_d2) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => {
                    let (b, c) = (&self.pool[&best], uc);
                    (c.t_start(), c.id()) < (b.t_start(), b.id())
                }
                std::cmp::Ordering::Greater => false,
            };
            if better {
                best = cid;
                best_d2 = d2;
            }
        }

        let old_addr = self.pool[&best].address().clone();
        let moved = self
            .pool
            .get_mut(&best)
            .expect("candidate is live")
            .assimilate(sample, t, &self.context);
        if moved {
            self.grid.remove(&old_addr);
            return self.place(best);
        }
        best
    }

    /// Register an unregistered microcluster under its current address,
    /// merging away collisions until it lands in a free cell.
    fn place(&mut self, id: u64) -> u64 {
        let mut id = id;
        loop {
            let addr: GridAddress = self.pool[&id].address().clone();
            let Some(other) = self.grid.get(&addr) else {
                self.grid.insert(addr, id);
                return id;
            };

            // Cell collision: the older microcluster absorbs the younger.
            let (survivor, victim) = {
                let (a, b) = (&self.pool[&id], &self.pool[&other]);
                if (a.t_start(), a.id()) <= (b.t_start(), b.id()) {
                    (id, other)
                } else {
                    (other, id)
                }
            };
            self.grid.remove(&addr);
            let victim_uc = self.pool.remove(&victim).expect("victim is live");
            self.active.remove(&victim);
            self.outliers.remove(&victim);
            self.merged.insert(victim, survivor);
            self.pool
                .get_mut(&survivor)
                .expect("survivor is live")
                .absorb(&victim_uc, &self.context);
            trace!(survivor, victim, "merged microclusters on re-address");
            id = survivor;
        }
    }

    /// Destroy outliers untouched for a full period.
    fn evict_stale(&mut self, t: u64) {
        let Some(g) = self.params.t_global else {
            return;
        };
        let stale: Vec<u64> = self
            .outliers
            .iter()
            .copied()
            .filter(|id| t - self.pool[id].t_last() >= g)
            .collect();
        for id in stale {
            let uc = self.pool.remove(&id).expect("outlier is live");
            self.grid.remove(uc.address());
            self.outliers.remove(&id);
            trace!(id, t_last = uc.t_last(), "evicted stale outlier");
        }
    }

    fn density_pass(&mut self, t: u64) {
        let outcome = density::run_pass(&mut self.pool, &self.context);
        self.active = outcome.active;
        self.outliers = outcome.outliers;
        self.clusters = outcome.clusters;

        let labeled: Vec<MicroCluster> = self
            .active
            .iter()
            .map(|id| &self.pool[id])
            .filter(|uc| uc.label().is_some())
            .cloned()
            .collect();
        let population: Vec<MicroCluster> = self.pool.values().cloned().collect();
        self.snapshots.record(Snapshot {
            timestamp: t,
            clusters: self.clusters.clone(),
            labeled,
            population,
        });
    }
}

impl StreamClustering for DyClee {
    fn fit_predict(&mut self, data: &[Vec<f32>]) -> Result<Vec<Option<usize>>> {
        self.run_dataset(data)
    }

    /// Number of final clusters found by the last density pass.
    fn n_clusters(&self) -> usize {
        self.clusters.len()
    }
}
