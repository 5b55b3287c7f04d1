use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encoder: empty image")]
    EmptyImage,

    #[error("encoder: image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("encoder: no face detected")]
    NoFace,

    #[error("encoder: unexpected embedding dimension: got {got}, want {want}")]
    UnexpectedDimension { got: usize, want: usize },

    #[error("encoder: service error: {0}")]
    Service(String),
}
