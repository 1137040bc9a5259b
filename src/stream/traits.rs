use crate::error::Result;

/// Common interface for streaming clustering algorithms (one label per point,
/// `None` while unclassed).
pub trait StreamClustering {
    /// Feed the whole dataset through the stream, then return one final
    /// cluster label per input point.
    fn fit_predict(&mut self, data: &[Vec<f32>]) -> Result<Vec<Option<usize>>>;

    /// The number of clusters discovered so far.
    ///
    /// Streaming algorithms discover this dynamically; before any density
    /// pass it is 0.
    fn n_clusters(&self) -> usize;
}
