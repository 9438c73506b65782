use crate::settings::GeometrySettings;

/// Common error type for the water-column core.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("ring underflow: requested {requested} items, {available} available")]
    Underflow { requested: usize, available: usize },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("grid shape mismatch: expected side {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("ring storage allocation failed: {0}")]
    Allocation(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// A processing step that keeps a private copy of the geometry settings.
///
/// `configure` is only ever called between two `execute` calls, so one input is
/// always processed against a single consistent snapshot.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn configure(&mut self, settings: &GeometrySettings) -> CoreResult<()>;
    fn execute(&mut self, input: Self::Input) -> CoreResult<Self::Output>;

    fn cleanup(&mut self) {}
}
