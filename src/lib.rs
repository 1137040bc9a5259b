//! Streaming density clustering.
//!
//! `dyclee` is an online, distance- and density-based clustering engine for
//! data streams whose generating process evolves over time (DyClee,
//! Barbosa Roa et al. 2019).
//!
//! The primary public API is under [`stream`], which provides:
//! - a per-sample distance stage maintaining hyperbox microclusters
//! - a periodic density stage deriving final clusters by face connectivity
//! - a pyramidal-time snapshot archive of past populations

#![forbid(unsafe_code)]

pub mod error;
pub mod stream;

pub use error::{Error, Result};
pub use stream::{
    Context, DensityType, DyClee, DyCleeParams, FinalCluster, MicroCluster, Snapshot,
    SnapshotStore, StreamClustering, UNCLASSED,
};
