//! Microclusters: the unit sufficient statistic of the stream.
//!
//! A microcluster summarizes the samples that fell into one hyperbox cell as
//! `(LS, n, t_start, t_last)`. Its center is `LS / n`; assimilating a sample
//! is O(d). Everything the density stage needs (density, class, label) is
//! derived or annotated here.

use super::context::{Context, GridAddress};

/// Density class assigned by the density stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityType {
    /// Density at or above the upper threshold; seeds final clusters.
    Dense,
    /// Between the thresholds; joins a cluster but does not extend one.
    SemiDense,
    /// Below the lower threshold; outlier, candidate for eviction.
    LowDensity,
}

impl DensityType {
    /// Dense and semi-dense microclusters form the active population.
    pub fn is_active(self) -> bool {
        !matches!(self, DensityType::LowDensity)
    }
}

/// A hyperbox cell with accumulated sufficient statistics.
///
/// Owned by the engine's pool; the grid index and the active/outlier lists
/// refer to it by id. Snapshots hold independent deep copies (`Clone`).
#[derive(Debug, Clone, PartialEq)]
pub struct MicroCluster {
    id: u64,
    n: u64,
    ls: Vec<f32>,
    t_start: u64,
    t_last: u64,
    density: f64,
    density_type: DensityType,
    label: Option<usize>,
    address: GridAddress,
}

impl MicroCluster {
    /// Spawn a microcluster from its first sample.
    pub(crate) fn new(id: u64, sample: &[f32], t: u64, ctx: &Context) -> Self {
        Self {
            id,
            n: 1,
            ls: sample.to_vec(),
            t_start: t,
            t_last: t,
            density: 0.0,
            density_type: DensityType::LowDensity,
            label: None,
            address: ctx.address(sample),
        }
    }

    /// Unique, monotonically assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of samples assimilated.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Elementwise linear sum of assimilated samples.
    pub fn linear_sum(&self) -> &[f32] {
        &self.ls
    }

    /// Center of mass, `LS / n`.
    pub fn center(&self) -> Vec<f32> {
        let n = self.n as f32;
        self.ls.iter().map(|&s| s / n).collect()
    }

    /// Timestamp of the first assimilated sample.
    pub fn t_start(&self) -> u64 {
        self.t_start
    }

    /// Timestamp of the most recent assimilated sample.
    pub fn t_last(&self) -> u64 {
        self.t_last
    }

    /// Density as of the last density pass (`n / hyperbox volume`).
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Density class as of the last density pass.
    pub fn density_type(&self) -> DensityType {
        self.density_type
    }

    /// Final-cluster label, or `None` while unclassed.
    pub fn label(&self) -> Option<usize> {
        self.label
    }

    /// Current grid address (kept in sync with the center).
    pub fn address(&self) -> &GridAddress {
        &self.address
    }

    /// Whether a point's cell is within this microcluster's Moore
    /// neighborhood, i.e. whether the point may assimilate here.
    pub fn reaches(&self, point: &[f32], ctx: &Context) -> bool {
        ctx.reachable(&ctx.address(point), &self.address)
    }

    /// Fold one sample in and re-derive the grid address.
    ///
    /// Returns `true` if the center crossed a cell boundary; the caller owns
    /// reconciling the grid index.
    pub(crate) fn assimilate(&mut self, sample: &[f32], t: u64, ctx: &Context) -> bool {
        for (s, x) in self.ls.iter_mut().zip(sample.iter()) {
            *s += x;
        }
        self.n += 1;
        self.t_last = self.t_last.max(t);
        self.refresh_address(ctx)
    }

    /// Merge another microcluster's statistics into this one.
    ///
    /// Returns `true` if the merged center crossed a cell boundary.
    pub(crate) fn absorb(&mut self, other: &MicroCluster, ctx: &Context) -> bool {
        for (s, x) in self.ls.iter_mut().zip(other.ls.iter()) {
            *s += x;
        }
        self.n += other.n;
        self.t_start = self.t_start.min(other.t_start);
        self.t_last = self.t_last.max(other.t_last);
        self.refresh_address(ctx)
    }

    pub(crate) fn refresh_address(&mut self, ctx: &Context) -> bool {
        let addr = ctx.address(&self.center());
        if addr == self.address {
            return false;
        }
        self.address = addr;
        true
    }

    /// Recompute density against the context hyperbox volume.
    pub(crate) fn recompute_density(&mut self, volume: f64) -> f64 {
        self.density = self.n as f64 / volume;
        self.density
    }

    pub(crate) fn set_density_type(&mut self, density_type: DensityType) {
        self.density_type = density_type;
    }

    pub(crate) fn set_label(&mut self, label: Option<usize>) {
        self.label = label;
    }
}
