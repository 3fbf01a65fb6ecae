use thiserror::Error;

/// Failure kinds surfaced by the composite operations.
///
/// None of these are retried internally: every stage is deterministic, so the caller gets the
/// error and no image.
#[derive(Debug, Error)]
pub enum PortraitError {
    /// Two grids that must align do not.
    #[error(
        "{what} is {}x{} but {}x{} was expected",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    DimensionMismatch {
        what: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// The coarse mask holds no background cells, so the depth baseline is undefined.
    #[error("no background reference cells available for the depth baseline")]
    InsufficientReferencePixels,
    /// Empty image, zero dimension, or an otherwise malformed argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The inference provider failed; its error chain is preserved as text.
    #[error("inference failed: {0}")]
    UpstreamInferenceFailure(String),
    /// A cancellation token fired between stages.
    #[error("composite cancelled before {stage}")]
    Cancelled { stage: &'static str },
}

pub type PortraitResult<T> = std::result::Result<T, PortraitError>;

impl PortraitError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PortraitError::InvalidInput(message.into())
    }

    /// Wrap an opaque provider error, keeping the full context chain.
    pub fn upstream(err: anyhow::Error) -> Self {
        PortraitError::UpstreamInferenceFailure(format!("{err:#}"))
    }

    pub(crate) fn ensure_dimensions(
        what: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> PortraitResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(PortraitError::DimensionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}
