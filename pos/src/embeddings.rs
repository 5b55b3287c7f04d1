use paylens_kv::KVStore;
use paylens_vecstore::{Match, MemoryIndex, VecIndex};
use tracing::warn;
use uuid::Uuid;

use crate::error::PosError;
use crate::keys::identity_prefix;
use crate::types::Identity;

/// EmbeddingStore is the in-memory identity → embedding set the matcher
/// scans. It mirrors the persisted identities: populated from storage at
/// startup, appended to after each successful enrollment.
///
/// Entries are held in enrollment order (`created_at`, then id, when
/// reloading) so the matcher's earliest-enrolled tie-break survives
/// restarts. The underlying index is lock-protected; a concurrent match
/// may or may not observe an in-flight append but always sees an
/// internally consistent set.
pub struct EmbeddingStore {
    index: MemoryIndex,
}

impl EmbeddingStore {
    /// Create an empty store for embeddings of the given dimensionality.
    pub fn new(dim: usize) -> Result<Self, PosError> {
        Ok(Self {
            index: MemoryIndex::new(dim)?,
        })
    }

    /// Populate the store from persisted identities. Returns how many
    /// embeddings were loaded.
    ///
    /// Rows that fail to decode, or whose embedding has the wrong
    /// dimensionality, are skipped with a warning rather than taking the
    /// whole process down; they can never match until repaired.
    pub fn load(&self, store: &dyn KVStore) -> Result<usize, PosError> {
        let rows = store.scan(identity_prefix())?;

        let mut identities = Vec::new();
        for (key, value) in rows {
            match rmp_serde::from_slice::<Identity>(&value) {
                Ok(identity) => identities.push(identity),
                Err(e) => warn!("skipping undecodable identity row {key}: {e}"),
            }
        }

        // Enrollment order: the tie-break contract depends on it.
        identities.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        let mut loaded = 0;
        for identity in identities {
            match self.index.insert(&identity.id.to_string(), &identity.embedding) {
                Ok(()) => loaded += 1,
                Err(e) => warn!("skipping identity {}: {e}", identity.id),
            }
        }
        Ok(loaded)
    }

    /// Add one enrolled identity's embedding, visible to all subsequent
    /// match calls. The identity must already be persisted.
    pub fn append(&self, identity: &Identity) -> Result<(), PosError> {
        self.index
            .insert(&identity.id.to_string(), &identity.embedding)?;
        Ok(())
    }

    pub(crate) fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, PosError> {
        Ok(self.index.search(query, top_k)?)
    }

    /// Number of embeddings currently matchable.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Fixed embedding dimensionality.
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use paylens_kv::MemoryStore;

    use crate::keys::identity_key;

    fn identity(name: &str, embedding: Vec<f32>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: name.into(),
            embedding,
            balance: 100.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_then_search() {
        let store = EmbeddingStore::new(3).unwrap();
        let alice = identity("alice", vec![1.0, 0.0, 0.0]);
        store.append(&alice).unwrap();

        let matches = store.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(matches[0].id, alice.id.to_string());
        assert!(matches[0].distance < 1e-6);
    }

    #[test]
    fn load_restores_persisted_identities() {
        let kv = MemoryStore::new();
        let alice = identity("alice", vec![1.0, 0.0, 0.0]);
        let bob = identity("bob", vec![0.0, 1.0, 0.0]);
        for who in [&alice, &bob] {
            kv.set(
                &identity_key(&who.id),
                &rmp_serde::to_vec_named(who).unwrap(),
            )
            .unwrap();
        }

        let store = EmbeddingStore::new(3).unwrap();
        assert_eq!(store.load(&kv).unwrap(), 2);
        assert_eq!(store.len(), 2);

        let matches = store.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(matches[0].id, bob.id.to_string());
    }

    #[test]
    fn load_skips_garbage_rows() {
        let kv = MemoryStore::new();
        kv.set("idn:broken", b"not msgpack").unwrap();
        let alice = identity("alice", vec![1.0, 0.0, 0.0]);
        kv.set(
            &identity_key(&alice.id),
            &rmp_serde::to_vec_named(&alice).unwrap(),
        )
        .unwrap();

        let store = EmbeddingStore::new(3).unwrap();
        assert_eq!(store.load(&kv).unwrap(), 1);
    }

    #[test]
    fn append_rejects_wrong_dimension() {
        let store = EmbeddingStore::new(3).unwrap();
        let bad = identity("alice", vec![1.0, 0.0]);
        assert!(matches!(
            store.append(&bad),
            Err(PosError::InvalidInput(_))
        ));
    }
}
