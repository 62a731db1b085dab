use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_TIME_PREFERENCE, DUE_HORIZON_HOURS, DUE_WEIGHT, HISTORY_WEIGHT, NEUTRAL_SCORE,
    PREFERRED_TASK_MINUTES, SIMILARITY_WEIGHT, TIME_PREFERENCE_WEIGHT,
};
use super::errors::ScoringError;
use super::vector::{cosine_similarity, ensure_finite};

/// The task fields that feed the personalized score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSignals {
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_minutes: Option<f64>,
    #[serde(default)]
    pub bert_vector: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSignals {
    #[serde(default)]
    pub user_embedding: Vec<f64>,
    /// Expected within [-0.2, 0.2]; applied as-is.
    #[serde(default)]
    pub priority_adjustment: f64,
}

/// Unweighted terms of a score plus the clamped weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub due: f64,
    pub similarity: f64,
    pub time_preference: f64,
    pub historical_adjustment: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn weighted_due(&self) -> f64 {
        DUE_WEIGHT * self.due
    }

    pub fn weighted_similarity(&self) -> f64 {
        SIMILARITY_WEIGHT * self.similarity
    }

    pub fn weighted_time_preference(&self) -> f64 {
        TIME_PREFERENCE_WEIGHT * self.time_preference
    }

    pub fn weighted_history(&self) -> f64 {
        HISTORY_WEIGHT * self.historical_adjustment
    }
}

pub fn score_breakdown(
    task: &TaskSignals,
    profile: &ProfileSignals,
    now: DateTime<Utc>,
) -> Result<ScoreBreakdown, ScoringError> {
    ensure_finite(&task.bert_vector, "task bert_vector")?;
    ensure_finite(&profile.user_embedding, "user_embedding")?;
    if !profile.priority_adjustment.is_finite() {
        return Err(ScoringError::NonFinite {
            field: "priority_adjustment",
        });
    }

    let due = match task.due_date {
        Some(due_date) => {
            let hours_until_due = (due_date - now).num_milliseconds() as f64 / 3_600_000.0;
            // Overdue tasks sit at the top of the ramp.
            (1.0 - hours_until_due.max(0.0) / DUE_HORIZON_HOURS).max(0.0)
        }
        None => 0.0,
    };

    let similarity = cosine_similarity(&profile.user_embedding, &task.bert_vector);

    let time_preference = match task.estimated_minutes {
        Some(minutes) if !minutes.is_finite() => {
            return Err(ScoringError::NonFinite {
                field: "estimated_minutes",
            })
        }
        Some(minutes) if minutes > 0.0 => (PREFERRED_TASK_MINUTES / minutes).min(1.0),
        _ => DEFAULT_TIME_PREFERENCE,
    };

    let historical_adjustment = profile.priority_adjustment;
    let total = DUE_WEIGHT * due
        + SIMILARITY_WEIGHT * similarity
        + TIME_PREFERENCE_WEIGHT * time_preference
        + HISTORY_WEIGHT * historical_adjustment;

    Ok(ScoreBreakdown {
        due,
        similarity,
        time_preference,
        historical_adjustment,
        total: total.clamp(0.0, 1.0),
    })
}

/// Personalized urgency score in [0, 1]; [`NEUTRAL_SCORE`] when the inputs are unusable.
pub fn compute_task_score(task: &TaskSignals, profile: &ProfileSignals, now: DateTime<Utc>) -> f64 {
    score_breakdown(task, profile, now)
        .map(|breakdown| breakdown.total)
        .unwrap_or(NEUTRAL_SCORE)
}
