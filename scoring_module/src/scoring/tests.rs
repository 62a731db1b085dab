use chrono::{Duration, TimeZone, Utc};

use super::{
    compute_task_score, cosine_similarity, ema_update, score_breakdown, update_embedding,
    EmbeddingUpdate, ProfileSignals, ScoringError, TaskSignals, NEUTRAL_SCORE,
};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn cosine_of_vector_with_itself_is_one() {
    let v = vec![0.3, -1.2, 4.5, 0.0, 2.0];
    assert_close(cosine_similarity(&v, &v), 1.0);
}

#[test]
fn cosine_with_zero_or_empty_vector_is_zero() {
    let v = vec![1.0, 2.0, 3.0];
    assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&v, &[]), 0.0);
    assert_eq!(cosine_similarity(&[], &v), 0.0);
}

#[test]
fn cosine_with_mismatched_lengths_is_zero() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
}

#[test]
fn cosine_of_opposite_vectors_is_negative_one() {
    assert_close(cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]), -1.0);
}

#[test]
fn ema_blends_with_learning_rate() {
    let blended = ema_update(&[1.0, 0.0], &[0.0, 1.0], 0.1).expect("ema");
    assert_close(blended[0], 0.9);
    assert_close(blended[1], 0.1);
}

#[test]
fn ema_rejects_dimension_mismatch() {
    let err = ema_update(&[1.0, 0.0], &[0.0, 1.0, 2.0], 0.1).unwrap_err();
    assert_eq!(
        err,
        ScoringError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn fresh_embedding_is_taken_verbatim() {
    let incoming = vec![0.25, -0.5, 0.75];
    let update = update_embedding(None, &incoming).expect("update");
    assert_eq!(update, EmbeddingUpdate::Initialized(incoming.clone()));

    let from_empty = update_embedding(Some(&[]), &incoming).expect("update");
    assert_eq!(from_empty.into_vector(), incoming);
}

#[test]
fn repeated_identical_update_is_a_fixed_point() {
    let incoming = vec![0.25, -0.5, 0.75];
    let first = update_embedding(None, &incoming).expect("first").into_vector();
    let second = update_embedding(Some(&first), &incoming)
        .expect("second")
        .into_vector();
    for (a, b) in second.iter().zip(&incoming) {
        assert_close(*a, *b);
    }
}

#[test]
fn update_rejects_empty_incoming_vector() {
    assert_eq!(
        update_embedding(Some(&[1.0]), &[]).unwrap_err(),
        ScoringError::EmptyVector
    );
}

#[test]
fn overdue_task_maxes_the_due_term() {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let task = TaskSignals {
        due_date: Some(now - Duration::hours(1)),
        ..TaskSignals::default()
    };
    let breakdown = score_breakdown(&task, &ProfileSignals::default(), now).expect("score");
    assert_close(breakdown.due, 1.0);
    assert_close(breakdown.weighted_due(), 0.45);
    assert_eq!(breakdown.similarity, 0.0);
    // Without a duration the default time preference still contributes.
    assert_close(breakdown.total, 0.45 + 0.2 * 0.5);
}

#[test]
fn due_term_decays_over_seventy_two_hours() {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let halfway = TaskSignals {
        due_date: Some(now + Duration::hours(36)),
        ..TaskSignals::default()
    };
    let far = TaskSignals {
        due_date: Some(now + Duration::hours(200)),
        ..TaskSignals::default()
    };
    let profile = ProfileSignals::default();
    assert_close(score_breakdown(&halfway, &profile, now).unwrap().due, 0.5);
    assert_eq!(score_breakdown(&far, &profile, now).unwrap().due, 0.0);
}

#[test]
fn time_preference_favors_short_tasks() {
    let now = Utc::now();
    let profile = ProfileSignals::default();
    let short = TaskSignals {
        estimated_minutes: Some(15.0),
        ..TaskSignals::default()
    };
    let long = TaskSignals {
        estimated_minutes: Some(120.0),
        ..TaskSignals::default()
    };
    let zero = TaskSignals {
        estimated_minutes: Some(0.0),
        ..TaskSignals::default()
    };
    assert_close(score_breakdown(&short, &profile, now).unwrap().time_preference, 1.0);
    assert_close(score_breakdown(&long, &profile, now).unwrap().time_preference, 0.25);
    assert_close(score_breakdown(&zero, &profile, now).unwrap().time_preference, 0.5);
}

#[test]
fn all_terms_combine_with_fixed_weights() {
    let now = Utc::now();
    let task = TaskSignals {
        due_date: Some(now),
        estimated_minutes: Some(30.0),
        bert_vector: vec![1.0, 0.0],
    };
    let profile = ProfileSignals {
        user_embedding: vec![1.0, 0.0],
        priority_adjustment: -0.2,
    };
    let score = compute_task_score(&task, &profile, now);
    assert_close(score, 0.45 + 0.25 + 0.2 - 0.02);
}

#[test]
fn non_finite_inputs_yield_neutral_score() {
    let now = Utc::now();
    let task = TaskSignals {
        bert_vector: vec![f64::NAN, 1.0],
        ..TaskSignals::default()
    };
    assert_eq!(
        compute_task_score(&task, &ProfileSignals::default(), now),
        NEUTRAL_SCORE
    );
}

#[test]
fn score_is_clamped_to_unit_interval() {
    let now = Utc::now();
    let task = TaskSignals {
        bert_vector: vec![-1.0, 0.0],
        estimated_minutes: Some(6000.0),
        ..TaskSignals::default()
    };
    let profile = ProfileSignals {
        user_embedding: vec![1.0, 0.0],
        priority_adjustment: -0.2,
    };
    assert_eq!(compute_task_score(&task, &profile, now), 0.0);
}

#[test]
fn signals_deserialize_with_missing_fields() {
    let task: TaskSignals =
        serde_json::from_str(r#"{"due_date":"2025-01-01T09:00:00Z"}"#).expect("task json");
    assert!(task.due_date.is_some());
    assert!(task.bert_vector.is_empty());
    let profile: ProfileSignals = serde_json::from_str("{}").expect("profile json");
    assert_eq!(profile.priority_adjustment, 0.0);
}
