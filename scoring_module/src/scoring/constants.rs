pub(super) const DUE_WEIGHT: f64 = 0.45;
pub(super) const SIMILARITY_WEIGHT: f64 = 0.25;
pub(super) const TIME_PREFERENCE_WEIGHT: f64 = 0.2;
pub(super) const HISTORY_WEIGHT: f64 = 0.1;

/// Urgency decays linearly to zero over this many hours before the due date.
pub(super) const DUE_HORIZON_HOURS: f64 = 72.0;
pub(super) const PREFERRED_TASK_MINUTES: f64 = 30.0;
pub(super) const COSINE_EPSILON: f64 = 1e-9;

pub const DEFAULT_TIME_PREFERENCE: f64 = 0.5;
/// Returned whenever a score cannot be computed.
pub const NEUTRAL_SCORE: f64 = 0.5;
pub const EMBEDDING_LEARNING_RATE: f64 = 0.1;
