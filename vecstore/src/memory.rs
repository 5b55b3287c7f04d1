use std::collections::HashMap;

use parking_lot::RwLock;

use crate::distance::euclidean_distance;
use crate::error::VecError;
use crate::vecstore::{Match, VecIndex};

/// MemoryIndex is an in-memory VecIndex using brute-force Euclidean
/// distance over an insertion-ordered list. Intended for small candidate
/// sets (< a few thousand vectors); search is O(n * dim).
///
/// Entries live in a Vec so that ties in distance resolve to the
/// earliest-inserted vector. Readers never observe a partially inserted
/// entry: all access goes through one RwLock.
pub struct MemoryIndex {
    dim: usize,
    inner: RwLock<Inner>,
}

struct Inner {
    entries: Vec<Entry>,
    positions: HashMap<String, usize>,
}

struct Entry {
    id: String,
    vector: Vec<f32>,
}

impl MemoryIndex {
    /// Create an empty index for vectors of the given dimensionality.
    pub fn new(dim: usize) -> Result<Self, VecError> {
        if dim == 0 {
            return Err(VecError::ZeroDimension);
        }
        Ok(Self {
            dim,
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                positions: HashMap::new(),
            }),
        })
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), VecError> {
        if vector.len() != self.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        Ok(())
    }
}

impl VecIndex for MemoryIndex {
    fn insert(&self, id: &str, vector: &[f32]) -> Result<(), VecError> {
        self.check_dim(vector)?;

        let mut inner = self.inner.write();
        match inner.positions.get(id).copied() {
            Some(pos) => inner.entries[pos].vector = vector.to_vec(),
            None => {
                let pos = inner.entries.len();
                inner.entries.push(Entry {
                    id: id.to_string(),
                    vector: vector.to_vec(),
                });
                inner.positions.insert(id.to_string(), pos);
            }
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        self.check_dim(query)?;

        let inner = self.inner.read();
        if inner.entries.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let mut results: Vec<(usize, f32)> = inner
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (pos, euclidean_distance(query, &e.vector)))
            .collect();

        // Stable sort: equal distances keep ascending insertion position.
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if results.len() > top_k {
            results.truncate(top_k);
        }

        Ok(results
            .into_iter()
            .map(|(pos, distance)| Match {
                id: inner.entries[pos].id.clone(),
                distance,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let idx = MemoryIndex::new(4).unwrap();
        idx.insert("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert("b", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        idx.insert("c", &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let matches = idx.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert!(matches[0].distance < 0.001);
        assert_eq!(matches[1].id, "c");
    }

    #[test]
    fn test_tie_breaks_by_insertion_order() {
        let idx = MemoryIndex::new(2).unwrap();
        // Equidistant from the query.
        idx.insert("second-place", &[1.0, 1.0]).unwrap();
        idx.insert("same-distance", &[-1.0, -1.0]).unwrap();

        let matches = idx.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(matches[0].id, "second-place");
        assert_eq!(matches[1].id, "same-distance");
        assert_eq!(matches[0].distance, matches[1].distance);
    }

    #[test]
    fn test_insert_existing_id_replaces_in_place() {
        let idx = MemoryIndex::new(2).unwrap();
        idx.insert("a", &[1.0, 0.0]).unwrap();
        idx.insert("b", &[0.0, 1.0]).unwrap();
        idx.insert("a", &[0.0, 1.0]).unwrap();
        assert_eq!(idx.len(), 2);

        // Both now equidistant: "a" kept its original (earlier) position.
        let matches = idx.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(matches[0].id, "a");
    }

    #[test]
    fn test_dimension_mismatch() {
        let idx = MemoryIndex::new(3).unwrap();
        assert!(matches!(
            idx.insert("a", &[1.0, 0.0]),
            Err(VecError::DimensionMismatch { got: 2, want: 3 })
        ));
        idx.insert("a", &[1.0, 0.0, 0.0]).unwrap();
        assert!(matches!(
            idx.search(&[1.0], 1),
            Err(VecError::DimensionMismatch { got: 1, want: 3 })
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(MemoryIndex::new(0), Err(VecError::ZeroDimension)));
    }

    #[test]
    fn test_search_empty() {
        let idx = MemoryIndex::new(3).unwrap();
        let matches = idx.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(matches.is_empty());
    }
}
