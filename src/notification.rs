//! Reviewer notifications
//!
//! Every notification goes to each user holding the `hr_manager` role.
//! Delivery is best-effort: a failed insert is logged and the rest continue.

use crate::db::{AppRole, DbError, FeedbackDb};
use crate::util::truncate_chars;

pub const NEGATIVE_FEEDBACK_TITLE: &str = "Negative Feedback Alert";
pub const NEGATIVE_FEEDBACK_TYPE: &str = "negative_feedback";
pub const SUBMISSION_TITLE: &str = "New Survey Submission";
pub const SUBMISSION_MESSAGE: &str = "An employee has completed a survey.";
pub const SUBMISSION_TYPE: &str = "survey_submission";

/// Insert one notification per reviewer. Returns how many were stored.
pub fn notify_reviewers(
    db: &FeedbackDb,
    title: &str,
    message: &str,
    kind: &str,
    related_id: Option<&str>,
) -> Result<usize, DbError> {
    let reviewers = db.get_user_ids_with_role(AppRole::HrManager)?;
    let mut sent = 0;
    for reviewer in &reviewers {
        match db.insert_notification(reviewer, title, message, kind, related_id) {
            Ok(_) => sent += 1,
            Err(e) => log::warn!("Failed to notify reviewer {}: {}", reviewer, e),
        }
    }
    Ok(sent)
}

pub fn negative_feedback_message(confidence: f64, summary: &str) -> String {
    format!(
        "Negative feedback detected with {}% confidence: {}",
        (confidence * 100.0).round() as i64,
        truncate_chars(summary, 100)
    )
}

/// Alert reviewers to a newly created negative-sentiment flag.
pub fn notify_negative_feedback(
    db: &FeedbackDb,
    flag_id: &str,
    confidence: f64,
    summary: &str,
) -> Result<usize, DbError> {
    notify_reviewers(
        db,
        NEGATIVE_FEEDBACK_TITLE,
        &negative_feedback_message(confidence, summary),
        NEGATIVE_FEEDBACK_TYPE,
        Some(flag_id),
    )
}

pub fn notify_survey_submission(db: &FeedbackDb) -> Result<usize, DbError> {
    notify_reviewers(db, SUBMISSION_TITLE, SUBMISSION_MESSAGE, SUBMISSION_TYPE, None)
}
