use uuid::Uuid;

use crate::embeddings::EmbeddingStore;
use crate::error::PosError;
use crate::pos::Pos;
use crate::types::Identity;

/// Default maximum distance for two embeddings to be treated as the same
/// person. Face embeddings of the same person typically land well under
/// this; different people rarely do.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// A successful identity match.
#[derive(Debug, Clone)]
pub struct MatchHit {
    pub identity_id: Uuid,

    /// Euclidean distance between the query and the enrolled embedding.
    pub distance: f32,
}

/// Matcher resolves a query embedding to an enrolled identity.
///
/// Policy: every candidate within `threshold` qualifies; the minimum
/// distance wins; ties go to the earliest-enrolled identity. The
/// tie-break is a deliberate determinism guarantee, provided by the
/// index's stable insertion-order sort.
pub struct Matcher {
    threshold: f32,
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Resolve a query against the embedding store.
    ///
    /// Returns `Ok(None)` when no candidate qualifies (including the empty
    /// store). A wrong-dimensionality query fails with
    /// [`PosError::InvalidInput`], never a silent non-match.
    pub fn resolve(
        &self,
        embeddings: &EmbeddingStore,
        query: &[f32],
    ) -> Result<Option<MatchHit>, PosError> {
        let matches = embeddings.search(query, 1)?;
        let best = match matches.first() {
            Some(m) if m.distance <= self.threshold => m,
            _ => return Ok(None),
        };

        let identity_id = Uuid::parse_str(&best.id)
            .map_err(|e| PosError::Internal(format!("bad id in embedding index: {e}")))?;

        Ok(Some(MatchHit {
            identity_id,
            distance: best.distance,
        }))
    }
}

impl Pos {
    /// Resolve a query embedding to the enrolled identity it belongs to,
    /// if any. Read-only; used by sign-in style flows to show who was
    /// recognized and their balance.
    pub fn identify(&self, query: &[f32]) -> Result<Option<(Identity, f32)>, PosError> {
        let hit = match self.matcher.resolve(&self.embeddings, query)? {
            Some(hit) => hit,
            None => return Ok(None),
        };

        let identity = self
            .read_identity(hit.identity_id)?
            .ok_or(PosError::IdentityNotFound(hit.identity_id))?;
        Ok(Some((identity, hit.distance)))
    }
}
