use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ScoringError {
    EmptyVector,
    DimensionMismatch { expected: usize, actual: usize },
    NonFinite { field: &'static str },
    InvalidLearningRate(f64),
}

impl fmt::Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringError::EmptyVector => write!(f, "embedding vector is empty"),
            ScoringError::DimensionMismatch { expected, actual } => write!(
                f,
                "embedding dimension mismatch (expected {}, got {})",
                expected, actual
            ),
            ScoringError::NonFinite { field } => {
                write!(f, "non-finite value in {}", field)
            }
            ScoringError::InvalidLearningRate(alpha) => {
                write!(f, "learning rate must be within [0, 1], got {}", alpha)
            }
        }
    }
}

impl std::error::Error for ScoringError {}
