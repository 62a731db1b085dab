use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, Document};
use scoring_module::{
    compute_task_score, update_embedding, EmbeddingUpdate, ProfileSignals, TaskSignals,
    NEUTRAL_SCORE,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::document_store::Collections;

use super::errors::ReminderError;
use super::records::bson_datetime;
use super::time::parse_iso_datetime;

/// One of a user's tasks with its personalized score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTask {
    pub task_id: String,
    pub task: String,
    pub score: f64,
}

/// Reads task and user documents for the scoring engine and writes the
/// learned user embedding back.
#[derive(Clone)]
pub struct Personalizer {
    collections: Collections,
}

impl Personalizer {
    pub fn new(collections: Collections) -> Self {
        Self { collections }
    }

    pub fn try_update_user_embedding(
        &self,
        user_id: &str,
        task_embedding: &[f64],
    ) -> Result<EmbeddingUpdate, ReminderError> {
        let user_filter = doc! { "_id": user_id };
        let Some(user) = self.collections.users.find_one(user_filter.clone())? else {
            let update = update_embedding(None, task_embedding)?;
            self.collections
                .users
                .insert_one(new_profile(user_id, update.vector(), Utc::now()))?;
            info!("created profile for user {}", user_id);
            return Ok(update);
        };

        let current = vector_field(&user, "user_embedding")?;
        let update = update_embedding(Some(current.as_slice()), task_embedding)?;
        self.collections.users.update_one(
            user_filter,
            doc! { "$set": { "user_embedding": update.vector().to_vec() } },
            false,
        )?;
        Ok(update)
    }

    /// Folds a task embedding into the user's profile. A rejected update
    /// leaves the stored embedding untouched.
    pub fn update_user_embedding(&self, user_id: &str, task_embedding: &[f64]) -> bool {
        match self.try_update_user_embedding(user_id, task_embedding) {
            Ok(_) => true,
            Err(err) => {
                warn!("error updating embedding for user {}: {}", user_id, err);
                false
            }
        }
    }

    pub fn compute_task_score(&self, task: &Document, profile: &Document) -> f64 {
        score_documents(task, profile, Utc::now())
    }

    /// Scores every task owned by `user_id`, highest first.
    pub fn rank_tasks(&self, user_id: &str) -> Result<Vec<RankedTask>, ReminderError> {
        let profile = self
            .collections
            .users
            .find_one(doc! { "_id": user_id })?
            .unwrap_or_default();
        let now = Utc::now();
        let mut ranked: Vec<RankedTask> = self
            .collections
            .tasks
            .find(doc! { "user_id": user_id })?
            .iter()
            .map(|task| RankedTask {
                task_id: task.get("_id").map(id_string).unwrap_or_default(),
                task: task.get_str("task").unwrap_or_default().to_string(),
                score: score_documents(task, &profile, now),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.task_id.cmp(&b.task_id)));
        Ok(ranked)
    }
}

/// Neutral score when either document carries malformed scoring fields.
pub fn score_documents(task: &Document, profile: &Document, now: DateTime<Utc>) -> f64 {
    let signals = task_signals(task).and_then(|task| Ok((task, profile_signals(profile)?)));
    match signals {
        Ok((task, profile)) => compute_task_score(&task, &profile, now),
        Err(err) => {
            warn!("error computing task score: {}", err);
            NEUTRAL_SCORE
        }
    }
}

pub fn task_signals(task: &Document) -> Result<TaskSignals, ReminderError> {
    let due_date = match task.get("due_date") {
        None | Some(Bson::Null) => None,
        Some(Bson::String(raw)) if raw.trim().is_empty() => None,
        Some(Bson::String(raw)) => Some(parse_iso_datetime(raw)?),
        Some(Bson::DateTime(value)) => Some(value.to_chrono()),
        Some(other) => {
            return Err(ReminderError::MalformedField {
                field: "due_date",
                reason: format!("unexpected {:?}", other.element_type()),
            })
        }
    };
    let estimated_minutes = match task.get("estimated_minutes") {
        None | Some(Bson::Null) => None,
        Some(value) => Some(number(value).ok_or_else(|| ReminderError::MalformedField {
            field: "estimated_minutes",
            reason: format!("unexpected {:?}", value.element_type()),
        })?),
    };
    Ok(TaskSignals {
        due_date,
        estimated_minutes,
        bert_vector: vector_field(task, "bert_vector")?,
    })
}

/// `priority_adjustment` is read from the profile itself, then from its
/// `behavior_stats`.
pub fn profile_signals(profile: &Document) -> Result<ProfileSignals, ReminderError> {
    let adjustment = profile.get("priority_adjustment").or_else(|| {
        profile
            .get_document("behavior_stats")
            .ok()
            .and_then(|stats| stats.get("priority_adjustment"))
    });
    let priority_adjustment = match adjustment {
        None | Some(Bson::Null) => 0.0,
        Some(value) => number(value).ok_or_else(|| ReminderError::MalformedField {
            field: "priority_adjustment",
            reason: format!("unexpected {:?}", value.element_type()),
        })?,
    };
    Ok(ProfileSignals {
        user_embedding: vector_field(profile, "user_embedding")?,
        priority_adjustment,
    })
}

fn new_profile(user_id: &str, embedding: &[f64], now: DateTime<Utc>) -> Document {
    doc! {
        "_id": user_id,
        "name": format!("User {}", user_id),
        "timezone": "UTC",
        "notification_methods": { "webpush": true, "email": true },
        "behavior_stats": {},
        "user_embedding": embedding.to_vec(),
        "created_at": bson_datetime(now),
    }
}

fn vector_field(doc: &Document, field: &'static str) -> Result<Vec<f64>, ReminderError> {
    match doc.get(field) {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(values)) => values
            .iter()
            .map(|value| {
                number(value).ok_or_else(|| ReminderError::MalformedField {
                    field,
                    reason: format!("non-numeric element {:?}", value.element_type()),
                })
            })
            .collect(),
        Some(other) => Err(ReminderError::MalformedField {
            field,
            reason: format!("expected an array, got {:?}", other.element_type()),
        }),
    }
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(value) => value.clone(),
        other => other.to_string(),
    }
}
