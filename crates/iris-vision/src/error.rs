use thiserror::Error;

/// Failure modes of the decode+suppress pipeline. A call either returns a
/// complete detection list or one of these; there is no partial output.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("tensor shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("invalid detector config: {0}")]
    Config(String),

    /// Opaque failure from the inference backend, propagated unchanged.
    #[error("inference engine failure")]
    Inference(#[source] anyhow::Error),
}
