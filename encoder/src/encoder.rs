use crate::error::EncodeError;

/// FaceEncoder reduces a photograph to a dense float32 feature vector.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait FaceEncoder: Send + Sync {
    /// Return the embedding vector for the most prominent face in the
    /// image. Fails with [`EncodeError::NoFace`] when the image decodes
    /// but contains no detectable face.
    async fn encode(&self, image: &[u8]) -> Result<Vec<f32>, EncodeError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
