//! Occupancy index over hyperbox grid addresses.
//!
//! Maps each occupied cell to the id of the microcluster whose center
//! currently lies in it. At most one live microcluster occupies a cell; the
//! engine resolves collisions by merging before re-registering.

use std::collections::HashMap;

use super::context::{Context, GridAddress};

#[derive(Debug, Clone, Default)]
pub(crate) struct GridIndex {
    cells: HashMap<GridAddress, u64>,
}

impl GridIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, addr: &[i64]) -> Option<u64> {
        self.cells.get(addr).copied()
    }

    pub(crate) fn insert(&mut self, addr: GridAddress, id: u64) -> Option<u64> {
        self.cells.insert(addr, id)
    }

    pub(crate) fn remove(&mut self, addr: &[i64]) -> Option<u64> {
        self.cells.remove(addr)
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Occupants of the Moore neighborhood of `addr` (the cell itself
    /// included): `3^d_cont` probes with ordinal coordinates pinned.
    pub(crate) fn moore_neighbors(&self, addr: &[i64], ctx: &Context) -> Vec<u64> {
        let cont: Vec<usize> = (0..ctx.dims()).filter(|&i| !ctx.is_ordinal(i)).collect();
        let mut probe = addr.to_vec();
        let mut out = Vec::new();
        for code in 0..3usize.pow(cont.len() as u32) {
            let mut c = code;
            for &dim in &cont {
                probe[dim] = addr[dim] + (c % 3) as i64 - 1;
                c /= 3;
            }
            if let Some(&id) = self.cells.get(&probe[..]) {
                out.push(id);
            }
        }
        out
    }

    /// Occupants of the face neighborhood of `addr`: one probe per sign per
    /// continuous dimension, ordinal coordinates pinned.
    pub(crate) fn face_neighbors(&self, addr: &[i64], ctx: &Context) -> Vec<u64> {
        let mut probe = addr.to_vec();
        let mut out = Vec::new();
        for dim in 0..ctx.dims() {
            if ctx.is_ordinal(dim) {
                continue;
            }
            for off in [-1i64, 1] {
                probe[dim] = addr[dim] + off;
                if let Some(&id) = self.cells.get(&probe[..]) {
                    out.push(id);
                }
            }
            probe[dim] = addr[dim];
        }
        out
    }
}
