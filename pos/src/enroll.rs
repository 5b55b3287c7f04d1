use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::keys::{identity_key, identity_prefix};
use crate::pos::Pos;
use crate::types::Identity;

/// Balance granted to every newly enrolled identity.
pub const STARTING_BALANCE: f64 = 100.0;

impl Pos {
    /// Enroll a new identity: persist it, then make it matchable.
    ///
    /// The identity row is written durably first; only then is the
    /// embedding appended to the in-memory store. A persistence failure
    /// therefore leaves no cache entry behind. The reverse gap, a crash
    /// after the write but before the append, leaves a
    /// persisted-but-unmatchable identity until the next startup reload
    /// (enrollment is at-least-once, not exactly-once).
    pub fn enroll(&self, name: &str, embedding: &[f32]) -> Result<Identity, PosError> {
        if name.trim().is_empty() {
            return Err(PosError::InvalidInput("name must not be empty".into()));
        }
        if embedding.len() != self.embeddings.dimension() {
            return Err(PosError::InvalidInput(format!(
                "embedding has {} dimensions, want {}",
                embedding.len(),
                self.embeddings.dimension()
            )));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            embedding: embedding.to_vec(),
            balance: STARTING_BALANCE,
            created_at: Utc::now(),
        };

        let data = rmp_serde::to_vec_named(&identity)
            .map_err(|e| PosError::Storage(format!("encoding identity: {e}")))?;
        self.store.set(&identity_key(&identity.id), &data)?;

        self.embeddings.append(&identity)?;

        info!("enrolled {} as {}", identity.name, identity.id);
        Ok(identity)
    }

    /// Full dump of enrolled identities: id, name, embedding, balance.
    pub fn identities(&self) -> Result<Vec<Identity>, PosError> {
        let rows = self.store.scan(identity_prefix())?;

        let mut identities = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let identity: Identity = rmp_serde::from_slice(&value)
                .map_err(|e| PosError::Storage(format!("decoding identity row {key}: {e}")))?;
            identities.push(identity);
        }

        identities.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(identities)
    }
}
