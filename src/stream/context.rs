//! Stream context: the declared bounding box and the hyperbox grid it induces.
//!
//! All spatial reasoning in the engine happens on integer grid addresses
//! derived from the context. Two adjacency relations are kept deliberately
//! separate:
//!
//! - [`Context::reachable`]: Moore neighborhood (diagonals included), used to
//!   gather assimilation candidates during ingestion.
//! - [`Context::direct`]: face adjacency (exactly one dimension off by one),
//!   used to connect microclusters into final clusters.
//!
//! Collapsing the two changes cluster shapes; face adjacency is what keeps
//! ring-like topologies intact.

use crate::error::{Error, Result};

/// Integer hyperbox address, one coordinate per dimension.
///
/// Continuous dimensions are bucketed by hyperbox side; ordinal dimensions
/// carry the raw (truncated) value.
pub type GridAddress = Vec<i64>;

/// Immutable bounding context declared at engine construction.
///
/// Samples outside the declared box are not rejected; they simply produce
/// grid addresses outside the nominal range.
#[derive(Debug, Clone)]
pub struct Context {
    phi: f32,
    lo: Vec<f32>,
    hi: Vec<f32>,
    ordinal: Vec<bool>,
    /// Hyperbox side per dimension: `phi * (hi - lo)` (unused for ordinal dims).
    side: Vec<f32>,
    /// Hyperbox volume over continuous dimensions only (1.0 if none).
    volume: f64,
}

impl Context {
    /// Create a context over all-continuous dimensions.
    ///
    /// # Arguments
    ///
    /// * `phi` - Relative hyperbox size in `(0, 1]`.
    /// * `bounds` - One `(lo, hi)` pair per dimension, `lo < hi`.
    pub fn new(phi: f32, bounds: &[(f32, f32)]) -> Result<Self> {
        let ordinal = vec![false; bounds.len()];
        Self::with_ordinal(phi, bounds, &ordinal)
    }

    /// Create a context with an ordinal mask.
    ///
    /// Ordinal dimensions are compared for exact equality rather than being
    /// bucketed by hyperbox; their bounds do not participate in the hyperbox
    /// volume.
    pub fn with_ordinal(phi: f32, bounds: &[(f32, f32)], ordinal: &[bool]) -> Result<Self> {
        if bounds.is_empty() {
            return Err(Error::BadConfig {
                name: "context",
                message: "must have at least one dimension",
            });
        }
        if !(phi > 0.0 && phi <= 1.0) {
            return Err(Error::BadConfig {
                name: "phi",
                message: "must be in (0, 1]",
            });
        }
        if ordinal.len() != bounds.len() {
            return Err(Error::BadConfig {
                name: "ordinal",
                message: "mask length must match context dimensionality",
            });
        }

        let mut lo = Vec::with_capacity(bounds.len());
        let mut hi = Vec::with_capacity(bounds.len());
        let mut side = Vec::with_capacity(bounds.len());
        let mut volume = 1.0f64;
        for (i, &(l, h)) in bounds.iter().enumerate() {
            if ordinal[i] {
                lo.push(l);
                hi.push(h);
                side.push(0.0);
                continue;
            }
            let s = phi * (h - l);
            if !(s > 0.0) || !s.is_finite() {
                return Err(Error::BadConfig {
                    name: "context",
                    message: "continuous dimensions require lo < hi and finite bounds",
                });
            }
            lo.push(l);
            hi.push(h);
            side.push(s);
            volume *= f64::from(s);
        }

        Ok(Self {
            phi,
            lo,
            hi,
            ordinal: ordinal.to_vec(),
            side,
            volume,
        })
    }

    /// Number of dimensions.
    pub fn dims(&self) -> usize {
        self.lo.len()
    }

    /// Relative hyperbox size.
    pub fn phi(&self) -> f32 {
        self.phi
    }

    /// Hyperbox side per dimension (0.0 on ordinal dimensions).
    pub fn hyperbox_sizes(&self) -> &[f32] {
        &self.side
    }

    /// Hyperbox volume over continuous dimensions (1.0 if all ordinal).
    pub fn hyperbox_volume(&self) -> f64 {
        self.volume
    }

    /// Whether dimension `dim` is ordinal.
    pub fn is_ordinal(&self, dim: usize) -> bool {
        self.ordinal[dim]
    }

    /// Number of continuous dimensions.
    pub fn continuous_dims(&self) -> usize {
        self.ordinal.iter().filter(|&&o| !o).count()
    }

    /// Grid address of a point.
    ///
    /// Continuous dimensions bucket by `floor((x - lo) / side)`; a point
    /// exactly on the upper boundary rounds down into the last cell. Ordinal
    /// dimensions carry the truncated raw value. NaN coordinates address to
    /// cell 0 (saturating cast); the sample is not rejected.
    pub fn address(&self, point: &[f32]) -> GridAddress {
        debug_assert_eq!(point.len(), self.dims());
        let mut addr = Vec::with_capacity(self.dims());
        for i in 0..self.dims() {
            if self.ordinal[i] {
                addr.push(point[i] as i64);
                continue;
            }
            let raw = (point[i] - self.lo[i]) / self.side[i];
            let mut cell = raw.floor() as i64;
            // Upper boundary rounds down into the last cell.
            if point[i] == self.hi[i] && raw == raw.floor() {
                cell -= 1;
            }
            addr.push(cell);
        }
        addr
    }

    /// Moore-neighborhood adjacency: every continuous coordinate within one
    /// cell, every ordinal coordinate equal.
    pub fn reachable(&self, a: &[i64], b: &[i64]) -> bool {
        debug_assert_eq!(a.len(), self.dims());
        debug_assert_eq!(b.len(), self.dims());
        for i in 0..self.dims() {
            if self.ordinal[i] {
                if a[i] != b[i] {
                    return false;
                }
            } else if (a[i] - b[i]).abs() > 1 {
                return false;
            }
        }
        true
    }

    /// Face adjacency: reachable, and at most one continuous coordinate
    /// differs (by exactly one). Corner contact does not connect.
    pub fn direct(&self, a: &[i64], b: &[i64]) -> bool {
        debug_assert_eq!(a.len(), self.dims());
        debug_assert_eq!(b.len(), self.dims());
        let mut off = 0usize;
        for i in 0..self.dims() {
            if self.ordinal[i] {
                if a[i] != b[i] {
                    return false;
                }
                continue;
            }
            match (a[i] - b[i]).abs() {
                0 => {}
                1 => off += 1,
                _ => return false,
            }
        }
        off <= 1
    }
}
