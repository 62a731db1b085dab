use std::sync::Arc;

use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document_store::Collections;

use super::errors::ReminderError;
use super::scheduler::ReminderScheduler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedTask {
    pub task: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlanItem {
    pub task: String,
    pub start_iso: String,
    pub end_iso: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecommendation {
    #[serde(default)]
    pub task: Option<String>,
    pub reminder_iso: String,
    /// push, email or in-app; every recommendation is scheduled as an in-app reminder.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Structured payload returned by the suggestion model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    #[serde(default)]
    pub categorized: Vec<CategorizedTask>,
    #[serde(default)]
    pub schedule_plan: Vec<SchedulePlanItem>,
    #[serde(default)]
    pub reminder_recs: Vec<ReminderRecommendation>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedSuggestion {
    pub categorized: usize,
    pub reminders_scheduled: usize,
    pub planned: usize,
}

/// Parses model output that may wrap the JSON in a code fence or surround
/// it with prose.
pub fn parse_suggestion(text: &str) -> Result<AiSuggestion, ReminderError> {
    let trimmed = text.trim();
    let unfenced = if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() > 2 {
            lines[1..lines.len() - 1].join("\n")
        } else {
            String::new()
        }
    } else {
        trimmed.to_string()
    };

    match serde_json::from_str(&unfenced) {
        Ok(parsed) => Ok(parsed),
        Err(err) => match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                Ok(serde_json::from_str(&trimmed[start..=end])?)
            }
            _ => Err(err.into()),
        },
    }
}

/// Writes an AI suggestion back onto the user's tasks and schedules the
/// reminders it recommends.
pub struct SuggestionApplier {
    collections: Collections,
    reminders: Arc<ReminderScheduler>,
}

impl SuggestionApplier {
    pub fn new(collections: Collections, reminders: Arc<ReminderScheduler>) -> Self {
        Self {
            collections,
            reminders,
        }
    }

    pub fn apply_suggestion(&self, user_id: &str, suggestion: &AiSuggestion) -> AppliedSuggestion {
        let categorized = suggestion
            .categorized
            .iter()
            .filter(|item| self.categorize(user_id, item))
            .count();
        let reminders_scheduled = self
            .reminders
            .schedule_ai_reminders(&suggestion.reminder_recs, user_id);
        let planned = self.apply_plan(&suggestion.schedule_plan, Some(user_id));
        info!(
            "applied suggestion for user {}: {} categorized, {} reminder(s), {} planned",
            user_id, categorized, reminders_scheduled, planned
        );
        AppliedSuggestion {
            categorized,
            reminders_scheduled,
            planned,
        }
    }

    /// Copies each plan item's window onto the task with the same text.
    /// Returns the number of plan items, matched or not.
    pub fn apply_schedule_plan(&self, plan: &[SchedulePlanItem]) -> usize {
        self.apply_plan(plan, None)
    }

    fn categorize(&self, user_id: &str, item: &CategorizedTask) -> bool {
        let update = doc! { "$set": {
            "category": optional_str(&item.category),
            "priority": optional_str(&item.priority),
            "last_ai_score": item.score.map(Bson::Double).unwrap_or(Bson::Null),
        } };
        match self
            .collections
            .tasks
            .update_one(task_filter(&item.task, Some(user_id)), update, false)
        {
            Ok(outcome) => outcome.matched > 0,
            Err(err) => {
                warn!("failed to categorize task {:?}: {}", item.task, err);
                false
            }
        }
    }

    fn apply_plan(&self, plan: &[SchedulePlanItem], user_id: Option<&str>) -> usize {
        for item in plan {
            let update = doc! { "$set": {
                "scheduled_start": item.start_iso.as_str(),
                "scheduled_end": item.end_iso.as_str(),
            } };
            if let Err(err) = self
                .collections
                .tasks
                .update_one(task_filter(&item.task, user_id), update, false)
            {
                warn!("failed to schedule task {:?}: {}", item.task, err);
            }
        }
        plan.len()
    }
}

fn task_filter(task_text: &str, user_id: Option<&str>) -> Document {
    let mut filter = doc! { "task": task_text };
    if let Some(user_id) = user_id {
        filter.insert("user_id", user_id);
    }
    filter
}

fn optional_str(value: &Option<String>) -> Bson {
    match value {
        Some(value) => Bson::String(value.clone()),
        None => Bson::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "categorized": [
            {"task": "File taxes", "category": "Finance", "priority": "High", "score": 0.9}
        ],
        "schedule_plan": [{
            "task": "File taxes",
            "start_iso": "2031-04-01T09:00:00Z",
            "end_iso": "2031-04-01T10:00:00Z",
            "reason": "deadline"
        }],
        "reminder_recs": [
            {"task": "File taxes", "reminder_iso": "2031-03-31T18:00:00Z", "method": "push"}
        ],
        "explanation": "Taxes are due soon."
    }"#;

    #[test]
    fn parses_plain_json() {
        let parsed = parse_suggestion(PAYLOAD).expect("parse");
        assert_eq!(parsed.categorized[0].category.as_deref(), Some("Finance"));
        assert_eq!(parsed.schedule_plan[0].reason, "deadline");
        assert_eq!(parsed.reminder_recs[0].method.as_deref(), Some("push"));
        assert_eq!(parsed.explanation, "Taxes are due soon.");
    }

    #[test]
    fn strips_code_fences() {
        let fenced = format!("```json\n{}\n```", PAYLOAD);
        assert_eq!(
            parse_suggestion(&fenced).expect("parse"),
            parse_suggestion(PAYLOAD).expect("parse")
        );
    }

    #[test]
    fn falls_back_to_outermost_braces() {
        let chatty = format!("Sure! Here is your plan:\n{}\nGood luck.", PAYLOAD);
        let parsed = parse_suggestion(&chatty).expect("parse");
        assert_eq!(parsed.schedule_plan.len(), 1);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let parsed = parse_suggestion(r#"{"explanation": "nothing to do"}"#).expect("parse");
        assert!(parsed.categorized.is_empty());
        assert!(parsed.reminder_recs.is_empty());
    }

    #[test]
    fn rejects_text_without_json() {
        assert!(matches!(
            parse_suggestion("I could not come up with a plan."),
            Err(ReminderError::Suggestion(_))
        ));
    }
}
