use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EncoderConfig;
use crate::encoder::FaceEncoder;
use crate::error::EncodeError;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8100";
const DEFAULT_DIM: usize = 128;

/// Encoding request body sent to the sidecar.
#[derive(Serialize)]
struct EncodeRequest<'a> {
    image: &'a str,
    dimensions: usize,
}

/// Encoding response body.
#[derive(Deserialize)]
struct EncodeResponse {
    embedding: Vec<f64>,
}

/// Error response body for face/image failures (HTTP 422).
#[derive(Deserialize)]
struct EncodeErrorResponse {
    code: String,
    #[serde(default)]
    message: String,
}

/// HttpEncoder calls an inference sidecar over HTTP.
///
/// Protocol: `POST {base_url}/encodings` with `{image: <base64>,
/// dimensions: n}`; success returns `{embedding: [f64; n]}`, extraction
/// failures return HTTP 422 with `{code: "no_face" | "invalid_image"}`.
pub struct HttpEncoder {
    client: Client,
    base_url: String,
    dim: usize,
}

impl HttpEncoder {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            dim: DEFAULT_DIM,
        }
    }

    pub fn with_config(cfg: EncoderConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: if cfg.base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                cfg.base_url
            },
            dim: if cfg.dimension == 0 {
                DEFAULT_DIM
            } else {
                cfg.dimension
            },
        }
    }
}

impl Default for HttpEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FaceEncoder for HttpEncoder {
    async fn encode(&self, image: &[u8]) -> Result<Vec<f32>, EncodeError> {
        if image.is_empty() {
            return Err(EncodeError::EmptyImage);
        }

        let url = format!("{}/encodings", self.base_url);
        let encoded = BASE64.encode(image);
        let body = EncodeRequest {
            image: &encoded,
            dimensions: self.dim,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EncodeError::Service(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| EncodeError::Service(e.to_string()))?;

        decode_response(status.as_u16(), &bytes, self.dim)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Map a sidecar response to an embedding or a typed failure.
fn decode_response(status: u16, body: &[u8], want_dim: usize) -> Result<Vec<f32>, EncodeError> {
    if status == 422 {
        let err: EncodeErrorResponse = serde_json::from_slice(body)
            .map_err(|e| EncodeError::Service(format!("malformed error body: {e}")))?;
        return Err(match err.code.as_str() {
            "no_face" => EncodeError::NoFace,
            "invalid_image" => EncodeError::InvalidImage(err.message),
            other => EncodeError::Service(format!("unknown error code: {other}")),
        });
    }

    if !(200..300).contains(&status) {
        let text = String::from_utf8_lossy(body);
        return Err(EncodeError::Service(format!("HTTP {status}: {text}")));
    }

    let data: EncodeResponse = serde_json::from_slice(body)
        .map_err(|e| EncodeError::Service(format!("malformed response: {e}")))?;

    if data.embedding.len() != want_dim {
        return Err(EncodeError::UnexpectedDimension {
            got: data.embedding.len(),
            want: want_dim,
        });
    }

    // float64 on the wire -> f32 in memory.
    Ok(data.embedding.iter().map(|&v| v as f32).collect())
}
