use paylens_kv::KVStore;
use tracing::info;
use uuid::Uuid;

use crate::embeddings::EmbeddingStore;
use crate::error::PosError;
use crate::keys::identity_key;
use crate::matcher::{DEFAULT_MATCH_THRESHOLD, Matcher};
use crate::types::Identity;

/// Default face-embedding dimensionality.
pub const DEFAULT_DIMENSION: usize = 128;

/// Builder-style configuration for [`Pos::open`].
pub struct PosConfig {
    pub dimension: usize,
    pub threshold: f32,
}

impl PosConfig {
    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

/// Pos is the point-of-sale service: enrollment, identity matching, and
/// atomic payments over one KV store.
///
/// Safe to share across threads behind an `Arc`; every request runs
/// against the same embedding store and the store's serializable write
/// transactions.
pub struct Pos {
    pub(crate) store: Box<dyn KVStore>,
    pub(crate) embeddings: EmbeddingStore,
    pub(crate) matcher: Matcher,
}

impl Pos {
    /// Open the service over a KV store, reloading every persisted
    /// identity into the embedding store.
    ///
    /// The reload is what reconciles an identity persisted by an
    /// enrollment that crashed before its cache append: after restart it
    /// is matchable again.
    pub fn open(store: Box<dyn KVStore>, cfg: PosConfig) -> Result<Self, PosError> {
        let embeddings = EmbeddingStore::new(cfg.dimension)?;
        let loaded = embeddings.load(store.as_ref())?;
        info!("loaded {loaded} enrolled identities");

        Ok(Self {
            store,
            embeddings,
            matcher: Matcher::new(cfg.threshold),
        })
    }

    /// Fixed embedding dimensionality for this service.
    pub fn dimension(&self) -> usize {
        self.embeddings.dimension()
    }

    /// Read one identity row from storage. `None` if absent.
    pub(crate) fn read_identity(&self, id: Uuid) -> Result<Option<Identity>, PosError> {
        let data = match self.store.get(&identity_key(&id))? {
            Some(data) => data,
            None => return Ok(None),
        };
        let identity = rmp_serde::from_slice(&data)
            .map_err(|e| PosError::Storage(format!("decoding identity {id}: {e}")))?;
        Ok(Some(identity))
    }
}
