use super::constants::{COSINE_EPSILON, EMBEDDING_LEARNING_RATE};
use super::errors::ScoringError;

/// Cosine similarity with a small epsilon in the denominator.
///
/// Empty, zero-norm, non-finite or differently sized inputs score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    if a.iter().chain(b.iter()).any(|value| !value.is_finite()) {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b + COSINE_EPSILON)
}

/// Element-wise exponential moving average: `(1 - alpha) * current + alpha * incoming`.
pub fn ema_update(current: &[f64], incoming: &[f64], alpha: f64) -> Result<Vec<f64>, ScoringError> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ScoringError::InvalidLearningRate(alpha));
    }
    if incoming.is_empty() {
        return Err(ScoringError::EmptyVector);
    }
    if current.len() != incoming.len() {
        return Err(ScoringError::DimensionMismatch {
            expected: current.len(),
            actual: incoming.len(),
        });
    }
    ensure_finite(incoming, "incoming embedding")?;
    ensure_finite(current, "current embedding")?;
    Ok(current
        .iter()
        .zip(incoming)
        .map(|(old, new)| (1.0 - alpha) * old + alpha * new)
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingUpdate {
    /// No embedding was stored yet; the task vector becomes the profile embedding.
    Initialized(Vec<f64>),
    Blended(Vec<f64>),
}

impl EmbeddingUpdate {
    pub fn vector(&self) -> &[f64] {
        match self {
            EmbeddingUpdate::Initialized(vector) | EmbeddingUpdate::Blended(vector) => vector,
        }
    }

    pub fn into_vector(self) -> Vec<f64> {
        match self {
            EmbeddingUpdate::Initialized(vector) | EmbeddingUpdate::Blended(vector) => vector,
        }
    }
}

/// Folds a new task vector into a stored user embedding.
///
/// A missing or empty stored embedding is replaced verbatim. Otherwise the
/// vectors must share a dimension and are blended with
/// [`EMBEDDING_LEARNING_RATE`]; on error the caller keeps the old embedding.
pub fn update_embedding(
    current: Option<&[f64]>,
    incoming: &[f64],
) -> Result<EmbeddingUpdate, ScoringError> {
    if incoming.is_empty() {
        return Err(ScoringError::EmptyVector);
    }
    match current {
        Some(current) if !current.is_empty() => Ok(EmbeddingUpdate::Blended(ema_update(
            current,
            incoming,
            EMBEDDING_LEARNING_RATE,
        )?)),
        _ => {
            ensure_finite(incoming, "incoming embedding")?;
            Ok(EmbeddingUpdate::Initialized(incoming.to_vec()))
        }
    }
}

pub(super) fn ensure_finite(values: &[f64], field: &'static str) -> Result<(), ScoringError> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(ScoringError::NonFinite { field })
    }
}
