//! Streaming clustering over evolving processes.
//!
//! This module provides the DyClee engine: online, distance- and
//! density-based clustering for d-dimensional numeric streams.
//!
//! ## Two stages
//!
//! **Distance stage** (per sample). The declared bounding [`Context`] induces
//! a grid of hyperboxes with side `phi * (hi - lo)` per dimension. Each
//! sample either assimilates into the nearest microcluster within its Moore
//! neighborhood or spawns a new one. A [`MicroCluster`] is just the
//! sufficient statistic `(LS, n, t_start, t_last)` of the samples it
//! absorbed, so this stage is O(d) per sample plus a constant number of grid
//! probes.
//!
//! **Density stage** (every `t_global` samples). The population is
//! reclassified against global density thresholds into dense, semi-dense,
//! and low-density microclusters, and final clusters are grown from dense
//! seeds outward over *face* adjacency. Semi-dense members join a cluster
//! but do not extend it; low-density members are outliers and are evicted
//! once stale.
//!
//! Past populations stay queryable through the pyramidal [`SnapshotStore`]:
//! dense coverage of the recent past, sparse coverage of deep history,
//! bounded total size.
//!
//! ## Usage
//!
//! ```rust
//! use dyclee::{Context, DyClee};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let context = Context::new(0.06, &[(0.0, 12.0), (0.0, 12.0)]).unwrap();
//! let mut engine = DyClee::new(context);
//! let labels = engine.run_dataset(&data).unwrap();
//! assert_eq!(labels.len(), data.len());
//!
//! // Streaming ingestion works sample by sample as well.
//! let context = Context::new(0.06, &[(0.0, 12.0), (0.0, 12.0)]).unwrap();
//! let mut engine = DyClee::new(context).with_t_global(2);
//! engine.ingest(&[0.05, 0.05], 0).unwrap();
//! engine.ingest(&[0.10, 0.00], 1).unwrap();
//! assert!(!engine.snapshots().is_empty());
//! ```

mod context;
mod density;
mod engine;
mod grid;
mod microcluster;
mod snapshot;
mod traits;
mod util;

pub use context::{Context, GridAddress};
pub use density::{FinalCluster, UNCLASSED};
pub use engine::{DyClee, DyCleeParams};
pub use microcluster::{DensityType, MicroCluster};
pub use snapshot::{Snapshot, SnapshotStore};
pub use traits::StreamClustering;
