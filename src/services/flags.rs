// Flag service
// Review-flag policy for negative sentiment and low ratings, plus reviewer actions.

use serde::Serialize;
use serde_json::Value;

use crate::db::{
    AppRole, DbFlag, DbSentiment, FeedbackDb, FlagInsert, IssueType, NewFlag, QuestionType,
    Sentiment, Severity, FLAG_STATUS_PENDING,
};
use crate::error::ServiceError;
use crate::intelligence::prompts::{extract_json_object, GENERAL_FEEDBACK_THEME};
use crate::util::truncate_chars;

/// Negative verdicts must be strictly more confident than this to raise a flag.
pub const FLAG_CONFIDENCE_THRESHOLD: f64 = 0.5;
/// Above this confidence a negative-sentiment flag is critical.
pub const CRITICAL_CONFIDENCE_THRESHOLD: f64 = 0.8;
/// Ratings at or below this score raise a low-rating flag.
pub const LOW_RATING_THRESHOLD: i32 = 2;
const DESCRIPTION_MAX_CHARS: usize = 250;

/// What the flag engine did for one answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlagOutcome {
    NotTriggered,
    Created {
        #[serde(rename = "flagId")]
        flag_id: String,
        severity: Severity,
    },
    /// A pending negative-sentiment flag already covers this employee and survey.
    Duplicate,
    /// The insert failed; logged, never surfaced to the submitter.
    Failed,
}

pub fn should_flag_negative(sentiment: Sentiment, confidence: f64) -> bool {
    sentiment == Sentiment::Negative && confidence > FLAG_CONFIDENCE_THRESHOLD
}

pub fn negative_sentiment_severity(confidence: f64) -> Severity {
    if confidence > CRITICAL_CONFIDENCE_THRESHOLD {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

pub fn is_low_rating(question_type: QuestionType, score: Option<i32>) -> bool {
    question_type == QuestionType::Rating && matches!(score, Some(s) if s <= LOW_RATING_THRESHOLD)
}

pub fn low_rating_severity(score: i32) -> Severity {
    if score == 1 {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

pub fn low_rating_description(score: i32) -> String {
    format!("Low rating submitted: {}/5", score)
}

/// Where the theme and summary of a flag description come from.
#[derive(Debug, Clone, PartialEq)]
enum Narrative {
    /// The stored summary is ordinary prose; the response text is quoted instead.
    Plain,
    /// The stored summary was a JSON blob. Either field may be missing.
    Embedded {
        theme: Option<String>,
        summary: Option<String>,
    },
    /// The stored summary looked like JSON but could not be read.
    Unreadable,
}

fn narrative(stored_summary: &str) -> Narrative {
    let Some(blob) = extract_json_object(stored_summary) else {
        return if stored_summary.contains('{') {
            Narrative::Unreadable
        } else {
            Narrative::Plain
        };
    };
    let Some(blob) = serde_json::from_str::<Value>(blob)
        .ok()
        .filter(Value::is_object)
    else {
        return Narrative::Unreadable;
    };

    let summary = blob
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let theme = blob
        .get("key_themes")
        .and_then(Value::as_array)
        .and_then(|themes| themes.first())
        .and_then(Value::as_str)
        .map(str::to_string);
    Narrative::Embedded { theme, summary }
}

/// Build the reviewer-facing description for a negative-sentiment flag.
///
/// Reads the theme and summary out of a JSON blob left in the stored summary;
/// otherwise quotes the response text under "general feedback".
pub fn negative_sentiment_description(stored_summary: &str, response_text: &str) -> String {
    let (theme, summary) = match narrative(stored_summary) {
        Narrative::Embedded { theme, summary } => (
            theme.unwrap_or_else(|| GENERAL_FEEDBACK_THEME.to_string()),
            summary.unwrap_or_else(|| response_text.to_string()),
        ),
        Narrative::Plain | Narrative::Unreadable => {
            (GENERAL_FEEDBACK_THEME.to_string(), response_text.to_string())
        }
    };
    truncate_chars(
        &format!("Analysis detected an issue in {}: {}", theme, summary),
        DESCRIPTION_MAX_CHARS,
    )
}

/// Raise a negative-sentiment flag for a stored verdict when the policy calls
/// for one, and alert reviewers about a new flag.
pub fn apply_negative_sentiment_policy(
    db: &FeedbackDb,
    employee_id: &str,
    survey_id: &str,
    analysis: &DbSentiment,
    response_text: &str,
) -> FlagOutcome {
    if !should_flag_negative(analysis.sentiment, analysis.confidence) {
        log::info!(
            "No flag needed. Sentiment: {}, Confidence: {}",
            analysis.sentiment.as_str(),
            analysis.confidence
        );
        return FlagOutcome::NotTriggered;
    }

    let severity = negative_sentiment_severity(analysis.confidence);
    let description =
        negative_sentiment_description(&analysis.ai_summary, response_text);
    let insert = db.insert_flag(&NewFlag {
        employee_id,
        survey_id,
        severity,
        issue_type: IssueType::NegativeSentiment,
        description: &description,
    });

    match insert {
        Ok(FlagInsert::Created(flag)) => {
            log::info!("Response flag {} created ({})", flag.id, severity.as_str());
            if let Err(e) = crate::notification::notify_negative_feedback(
                db,
                &flag.id,
                analysis.confidence,
                &analysis.ai_summary,
            ) {
                log::warn!("Failed to notify reviewers about flag {}: {}", flag.id, e);
            }
            FlagOutcome::Created {
                flag_id: flag.id,
                severity,
            }
        }
        Ok(FlagInsert::Duplicate) => {
            log::info!(
                "Pending negative-sentiment flag already exists for {} in {}, skipping",
                employee_id,
                survey_id
            );
            FlagOutcome::Duplicate
        }
        Err(e) => {
            log::error!("Error creating response flag: {}", e);
            FlagOutcome::Failed
        }
    }
}

/// Raise a low-rating flag when the policy calls for one. No dedup, no
/// reviewer notification.
pub fn apply_low_rating_policy(
    db: &FeedbackDb,
    employee_id: &str,
    survey_id: &str,
    question_type: QuestionType,
    score: Option<i32>,
) -> FlagOutcome {
    let Some(score) = score.filter(|_| is_low_rating(question_type, score)) else {
        return FlagOutcome::NotTriggered;
    };

    let severity = low_rating_severity(score);
    let description = low_rating_description(score);
    match db.insert_flag(&NewFlag {
        employee_id,
        survey_id,
        severity,
        issue_type: IssueType::LowRating,
        description: &description,
    }) {
        Ok(FlagInsert::Created(flag)) => FlagOutcome::Created {
            flag_id: flag.id,
            severity,
        },
        Ok(FlagInsert::Duplicate) => FlagOutcome::Duplicate,
        Err(e) => {
            log::error!("Error creating low-rating flag: {}", e);
            FlagOutcome::Failed
        }
    }
}

/// Mark a pending flag reviewed on behalf of an HR manager.
pub fn review_flag(db: &FeedbackDb, flag_id: &str, reviewer_id: &str) -> Result<DbFlag, ServiceError> {
    if !db.has_role(reviewer_id, AppRole::HrManager)? {
        return Err(ServiceError::Forbidden);
    }

    let flag = db
        .get_flag(flag_id)?
        .ok_or_else(|| ServiceError::NotFound("Flag".to_string()))?;
    if flag.status != FLAG_STATUS_PENDING {
        return Err(ServiceError::Conflict(format!(
            "Flag {} is already {}",
            flag_id, flag.status
        )));
    }

    if !db.mark_flag_reviewed(flag_id, reviewer_id)? {
        return Err(ServiceError::Conflict(format!(
            "Flag {} is no longer pending",
            flag_id
        )));
    }
    log::info!("Flag {} reviewed by {}", flag_id, reviewer_id);

    db.get_flag(flag_id)?
        .ok_or_else(|| ServiceError::NotFound("Flag".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{count_rows, seed_profile, seed_survey, test_db};
    use crate::db::FLAG_STATUS_REVIEWED;

    fn verdict(sentiment: Sentiment, confidence: f64, summary: &str) -> DbSentiment {
        DbSentiment {
            id: "sa-1".into(),
            response_id: "resp-1".into(),
            sentiment,
            confidence,
            key_themes: vec!["workload".into(), "management".into()],
            ai_summary: summary.into(),
            analyzed_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_trigger_requires_negative_above_half() {
        assert!(!should_flag_negative(Sentiment::Negative, 0.5));
        assert!(should_flag_negative(Sentiment::Negative, 0.51));
        assert!(!should_flag_negative(Sentiment::Positive, 0.99));
        assert!(!should_flag_negative(Sentiment::Neutral, 0.99));
    }

    #[test]
    fn test_severity_boundaries() {
        assert_eq!(negative_sentiment_severity(0.8), Severity::Warning);
        assert_eq!(negative_sentiment_severity(0.81), Severity::Critical);
        assert_eq!(negative_sentiment_severity(0.51), Severity::Warning);
    }

    #[test]
    fn test_low_rating_rule() {
        assert!(is_low_rating(QuestionType::Rating, Some(1)));
        assert!(is_low_rating(QuestionType::Rating, Some(2)));
        assert!(!is_low_rating(QuestionType::Rating, Some(3)));
        assert!(!is_low_rating(QuestionType::Rating, None));
        assert!(!is_low_rating(QuestionType::Text, Some(1)));
        assert_eq!(low_rating_severity(1), Severity::Critical);
        assert_eq!(low_rating_severity(2), Severity::Warning);
        assert_eq!(low_rating_description(1), "Low rating submitted: 1/5");
    }

    #[test]
    fn test_plain_summary_quotes_the_response_text() {
        let desc = negative_sentiment_description(
            "Employee reports a hostile manager",
            "I hate my manager and the workload is unbearable",
        );
        assert_eq!(
            desc,
            "Analysis detected an issue in general feedback: I hate my manager and the workload is unbearable"
        );
    }

    #[test]
    fn test_description_from_embedded_json_summary() {
        let stored = r#"```json {"summary": "Manager ignores concerns", "key_themes": ["leadership", "trust"]} ```"#;
        let desc = negative_sentiment_description(stored, "raw text");
        assert_eq!(
            desc,
            "Analysis detected an issue in leadership: Manager ignores concerns"
        );
    }

    #[test]
    fn test_embedded_fields_fall_back_independently() {
        let desc = negative_sentiment_description(r#"{"key_themes":["pay"]}"#, "Underpaid");
        assert_eq!(desc, "Analysis detected an issue in pay: Underpaid");

        let desc = negative_sentiment_description(r#"{"summary":"Too many meetings"}"#, "raw");
        assert_eq!(
            desc,
            "Analysis detected an issue in general feedback: Too many meetings"
        );
    }

    #[test]
    fn test_unreadable_json_summary_falls_back_to_response_text() {
        let desc = negative_sentiment_description(r#"{"summary": broken"#, "I am burnt out");
        assert_eq!(desc, "Analysis detected an issue in general feedback: I am burnt out");
    }

    #[test]
    fn test_description_is_capped() {
        let desc = negative_sentiment_description("Long", &"x".repeat(400));
        assert_eq!(desc.chars().count(), 250);
        assert!(desc.starts_with("Analysis detected an issue in"));
    }

    #[test]
    fn test_negative_policy_creates_one_flag_and_notifies() {
        let db = test_db();
        db.assign_role("hr-1", AppRole::HrManager).unwrap();
        let (survey_id, _) = seed_survey(&db, &[QuestionType::Text]);
        let employee = seed_profile(&db, "u1", "Sales");

        let first = apply_negative_sentiment_policy(
            &db,
            &employee,
            &survey_id,
            &verdict(Sentiment::Negative, 0.92, "Burnout"),
            "I hate my manager",
        );
        assert!(matches!(first, FlagOutcome::Created { severity: Severity::Critical, .. }));

        let second = apply_negative_sentiment_policy(
            &db,
            &employee,
            &survey_id,
            &verdict(Sentiment::Negative, 0.7, "Still unhappy"),
            "Nothing changed",
        );
        assert_eq!(second, FlagOutcome::Duplicate);
        assert_eq!(count_rows(&db, "response_flags", None), 1);
        assert_eq!(db.get_notifications("hr-1", false).unwrap().len(), 1);
    }

    #[test]
    fn test_negative_policy_ignores_weak_verdicts() {
        let db = test_db();
        let outcome = apply_negative_sentiment_policy(
            &db,
            "e1",
            "s1",
            &verdict(Sentiment::Negative, 0.5, "Meh"),
            "meh",
        );
        assert_eq!(outcome, FlagOutcome::NotTriggered);
        assert_eq!(count_rows(&db, "response_flags", None), 0);
    }

    #[test]
    fn test_low_rating_flags_are_not_deduplicated() {
        let db = test_db();
        db.assign_role("hr-1", AppRole::HrManager).unwrap();
        for _ in 0..2 {
            let outcome = apply_low_rating_policy(&db, "e1", "s1", QuestionType::Rating, Some(1));
            assert!(matches!(outcome, FlagOutcome::Created { severity: Severity::Critical, .. }));
        }
        assert_eq!(
            count_rows(&db, "response_flags", Some("issue_type = 'low_rating'")),
            2
        );
        assert!(db.get_notifications("hr-1", false).unwrap().is_empty());
    }

    #[test]
    fn test_review_flag_permissions_and_state() {
        let db = test_db();
        db.assign_role("hr-1", AppRole::HrManager).unwrap();
        let FlagOutcome::Created { flag_id, .. } =
            apply_low_rating_policy(&db, "e1", "s1", QuestionType::Rating, Some(2))
        else {
            panic!("expected a flag");
        };

        assert!(matches!(
            review_flag(&db, &flag_id, "emp-9"),
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            review_flag(&db, "flag-missing", "hr-1"),
            Err(ServiceError::NotFound(_))
        ));

        let reviewed = review_flag(&db, &flag_id, "hr-1").unwrap();
        assert_eq!(reviewed.status, FLAG_STATUS_REVIEWED);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("hr-1"));

        assert!(matches!(
            review_flag(&db, &flag_id, "hr-1"),
            Err(ServiceError::Conflict(_))
        ));
    }
}
