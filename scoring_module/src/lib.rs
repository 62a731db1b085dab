mod scoring;

pub use scoring::{
    compute_task_score, cosine_similarity, ema_update, score_breakdown, update_embedding,
    EmbeddingUpdate, ProfileSignals, ScoreBreakdown, ScoringError, TaskSignals,
    DEFAULT_TIME_PREFERENCE, EMBEDDING_LEARNING_RATE, NEUTRAL_SCORE,
};
