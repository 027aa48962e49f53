use thiserror::Error;

/// Central error type for the spectral-stem-splitter crate.
///
/// Every variant is terminal for the conversion that raised it.
#[derive(Debug, Error)]
pub enum StemError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Failed to load {stems}-stem model: {reason}")]
    ModelLoad { stems: usize, reason: String },

    #[error("Inference failed at frame {frame}: {reason}")]
    Inference { frame: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StemError {
    pub fn inference(frame: usize, reason: impl Into<String>) -> Self {
        StemError::Inference {
            frame,
            reason: reason.into(),
        }
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for StemError {
    fn from(e: std::io::Error) -> Self {
        StemError::Anyhow(e.into())
    }
}

impl From<hound::Error> for StemError {
    fn from(e: hound::Error) -> Self {
        StemError::Anyhow(e.into())
    }
}

impl From<symphonia::core::errors::Error> for StemError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        StemError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StemError>;
