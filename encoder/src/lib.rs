//! Face-embedding extraction seam.
//!
//! The extractor itself (image decoding, face detection, the embedding
//! network) runs out of process; this crate defines the [`FaceEncoder`]
//! trait the rest of the system programs against and an HTTP client for an
//! inference sidecar speaking a small JSON protocol.

mod config;
mod encoder;
mod error;
mod http;

pub use config::EncoderConfig;
pub use encoder::FaceEncoder;
pub use error::EncodeError;
pub use http::HttpEncoder;
