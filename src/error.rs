use thiserror::Error;

/// Failures produced by the grade and risk engines. The engines never log or
/// retry; callers decide whether a failed student aborts or is skipped.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),
}
