use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the point-of-sale core.
///
/// The first six kinds are user-triggerable and safe to surface verbatim.
/// `Storage` and `Internal` are logged in full at the call site and carry
/// no sensitive internal detail in their display form.
#[derive(Error, Debug)]
pub enum PosError {
    #[error("pos: invalid input: {0}")]
    InvalidInput(String),

    #[error("pos: no face detected in the submitted photo")]
    NoFaceDetected,

    #[error("pos: no enrolled identity matches")]
    Unauthorized,

    /// A matched identity is missing from storage. The embedding cache and
    /// the persisted rows have diverged; this is a data-integrity fault,
    /// not a user error.
    #[error("pos: matched identity {0} not found in storage")]
    IdentityNotFound(Uuid),

    #[error("pos: insufficient funds: balance {balance:.2}, requested {requested:.2}")]
    InsufficientFunds { balance: f64, requested: f64 },

    #[error("pos: out of stock: item {item_id}")]
    OutOfStock { item_id: u32 },

    #[error("pos: storage error: {0}")]
    Storage(String),

    #[error("pos: internal error: {0}")]
    Internal(String),
}

impl From<paylens_kv::KVError> for PosError {
    fn from(e: paylens_kv::KVError) -> Self {
        PosError::Storage(e.to_string())
    }
}

impl From<paylens_vecstore::VecError> for PosError {
    fn from(e: paylens_vecstore::VecError) -> Self {
        match e {
            paylens_vecstore::VecError::DimensionMismatch { .. }
            | paylens_vecstore::VecError::ZeroDimension => PosError::InvalidInput(e.to_string()),
        }
    }
}
