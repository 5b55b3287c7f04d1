/// Builder-style configuration for encoder implementations.
pub struct EncoderConfig {
    pub base_url: String,
    pub dimension: usize,
}

impl EncoderConfig {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            dimension: 0,
        }
    }
}
