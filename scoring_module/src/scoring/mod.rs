mod constants;
mod errors;
mod score;
mod vector;

pub use constants::{DEFAULT_TIME_PREFERENCE, EMBEDDING_LEARNING_RATE, NEUTRAL_SCORE};
pub use errors::ScoringError;
pub use score::{compute_task_score, score_breakdown, ProfileSignals, ScoreBreakdown, TaskSignals};
pub use vector::{cosine_similarity, ema_update, update_embedding, EmbeddingUpdate};

#[cfg(test)]
mod tests;
