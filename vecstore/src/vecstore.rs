use crate::error::VecError;

/// Match is a single result from a vector similarity search.
#[derive(Debug, Clone)]
pub struct Match {
    /// Identifier of the matched vector.
    pub id: String,

    /// Euclidean distance between the query and matched vector.
    /// Lower values indicate higher similarity.
    pub distance: f32,
}

/// VecIndex is the interface for nearest-neighbor search over dense
/// float32 vectors of one fixed dimensionality.
///
/// All implementations must be safe for concurrent use (Send + Sync).
pub trait VecIndex: Send + Sync {
    /// Add a vector with the given ID. Inserting an existing ID replaces
    /// its vector in place, keeping the original insertion position.
    /// Fails with [`VecError::DimensionMismatch`] on a wrong-length vector.
    fn insert(&self, id: &str, vector: &[f32]) -> Result<(), VecError>;

    /// Return the top-k nearest vectors to the query, ordered by ascending
    /// distance. Equal distances keep insertion order (earliest first).
    /// Fails with [`VecError::DimensionMismatch`] on a wrong-length query.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError>;

    /// Return the number of vectors in the index.
    fn len(&self) -> usize;

    /// Return true if the index contains no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the fixed dimensionality of the index.
    fn dimension(&self) -> usize;
}
