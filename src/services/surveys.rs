// Survey service
// Survey authoring and response submission. Submission persists every answer,
// runs sentiment analysis on text answers, applies the low-rating rule to
// ratings and tells reviewers a survey was completed.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::db::{
    AppRole, DbProfile, DbQuestion, DbResponse, DbSentiment, DbSurvey, FeedbackDb, NewResponse,
    QuestionType,
};
use crate::error::ServiceError;
use crate::services::flags::{apply_low_rating_policy, FlagOutcome};
use crate::services::sentiment::{classify, record_verdict};
use crate::state::AppState;
use crate::util::{email_local_part, non_blank};

const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 1000;
const QUESTION_MAX_CHARS: usize = 500;
const DEFAULT_DEPARTMENT: &str = "General";
const UNKNOWN_EMAIL: &str = "unknown@example.com";

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestionInput {
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_required")]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSurveyInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub questions: Vec<NewQuestionInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyWithQuestions {
    #[serde(flatten)]
    pub survey: DbSurvey,
    pub questions: Vec<DbQuestion>,
}

/// Check a survey draft. The first problem found is reported.
pub fn validate_survey(input: &NewSurveyInput) -> Result<(), ServiceError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ServiceError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ServiceError::Validation("Title too long".to_string()));
    }
    if let Some(description) = &input.description {
        if description.trim().chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(ServiceError::Validation("Description too long".to_string()));
        }
    }
    if input.questions.is_empty() {
        return Err(ServiceError::Validation(
            "At least one question is required".to_string(),
        ));
    }
    for (i, question) in input.questions.iter().enumerate() {
        let text = question.question_text.trim();
        if text.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Question {}: Question text is required",
                i + 1
            )));
        }
        if text.chars().count() > QUESTION_MAX_CHARS {
            return Err(ServiceError::Validation(format!(
                "Question {}: Question too long",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Validate and store a survey with its questions in one transaction.
pub fn create_survey(
    db: &FeedbackDb,
    input: &NewSurveyInput,
) -> Result<SurveyWithQuestions, ServiceError> {
    validate_survey(input)?;

    let created = db.with_transaction(|tx| {
        let survey = tx.create_survey(
            input.title.trim(),
            non_blank(input.description.as_deref()),
            non_blank(input.created_by.as_deref()),
        )?;
        let mut questions = Vec::with_capacity(input.questions.len());
        for (i, q) in input.questions.iter().enumerate() {
            questions.push(tx.insert_question(
                &survey.id,
                q.question_text.trim(),
                q.question_type,
                q.required,
                i as i32,
            )?);
        }
        Ok(SurveyWithQuestions { survey, questions })
    })?;

    log::info!(
        "Survey {} published with {} questions",
        created.survey.id,
        created.questions.len()
    );
    Ok(created)
}

pub fn get_questions(db: &FeedbackDb, survey_id: &str) -> Result<Vec<DbQuestion>, ServiceError> {
    if db.get_survey(survey_id)?.is_none() {
        return Err(ServiceError::NotFound("Survey".to_string()));
    }
    Ok(db.get_questions(survey_id)?)
}

pub fn delete_survey(db: &FeedbackDb, survey_id: &str) -> Result<(), ServiceError> {
    if !db.delete_survey(survey_id)? {
        return Err(ServiceError::NotFound("Survey".to_string()));
    }
    log::info!("Survey {} deleted", survey_id);
    Ok(())
}

// =============================================================================
// Profiles
// =============================================================================

/// Identity of the person submitting or registering. Authentication is
/// handled upstream; these fields are trusted as given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Respondent {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role: Option<AppRole>,
}

fn profile_fields(who: &Respondent) -> (String, String, String) {
    let email = non_blank(who.email.as_deref())
        .unwrap_or(UNKNOWN_EMAIL)
        .to_string();
    let full_name = non_blank(who.full_name.as_deref())
        .map(str::to_string)
        .or_else(|| {
            non_blank(who.email.as_deref())
                .map(email_local_part)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "User".to_string());
    let department = non_blank(who.department.as_deref())
        .unwrap_or(DEFAULT_DEPARTMENT)
        .to_string();
    (email, full_name, department)
}

/// Create or update a profile explicitly.
pub fn register_profile(db: &FeedbackDb, who: &Respondent) -> Result<DbProfile, ServiceError> {
    if who.user_id.trim().is_empty() {
        return Err(ServiceError::Validation("userId is required".to_string()));
    }
    let (email, full_name, department) = profile_fields(who);
    let role = who.role.unwrap_or(AppRole::Employee);
    Ok(db.upsert_profile(who.user_id.trim(), &email, &full_name, &department, role)?)
}

/// Existing profile for the respondent, or a new employee profile.
pub fn ensure_profile(db: &FeedbackDb, who: &Respondent) -> Result<DbProfile, ServiceError> {
    if let Some(profile) = db.get_profile_by_user(who.user_id.trim())? {
        return Ok(profile);
    }
    log::info!("Creating profile for first-time respondent {}", who.user_id);
    register_profile(
        db,
        &Respondent {
            role: Some(AppRole::Employee),
            ..who.clone()
        },
    )
}

// =============================================================================
// Submission
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: String,
    pub value: String,
    #[serde(default)]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    #[serde(flatten)]
    pub respondent: Respondent,
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub response: DbResponse,
    pub sentiment: Option<DbSentiment>,
    pub flag: FlagOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub employee_id: String,
    pub answers: Vec<SubmittedAnswer>,
}

/// An answer that passed validation, with its question type resolved.
struct CheckedAnswer<'a> {
    question_id: &'a str,
    question_type: QuestionType,
    value: Cow<'a, str>,
    score: Option<i32>,
}

fn check_answers<'a>(
    questions: &[DbQuestion],
    answers: &'a [AnswerInput],
) -> Result<Vec<CheckedAnswer<'a>>, ServiceError> {
    if answers.is_empty() {
        return Err(ServiceError::Validation("No answers submitted".to_string()));
    }
    let by_id: HashMap<&str, &DbQuestion> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut seen = HashSet::new();
    let mut checked = Vec::with_capacity(answers.len());
    for answer in answers {
        let question = by_id.get(answer.question_id.as_str()).ok_or_else(|| {
            ServiceError::Validation(format!(
                "Question {} does not belong to this survey",
                answer.question_id
            ))
        })?;
        if !seen.insert(answer.question_id.as_str()) {
            return Err(ServiceError::Validation(format!(
                "Question {} answered more than once",
                answer.question_id
            )));
        }

        let (value, score) = match question.question_type {
            QuestionType::Rating => {
                let parsed = non_blank(Some(answer.value.as_str())).map(|v| v.parse::<i32>().ok());
                let score = match (answer.score, parsed) {
                    (Some(score), Some(Some(parsed))) if score != parsed => {
                        return Err(ServiceError::Validation(format!(
                            "Rating for question {} has a value that disagrees with its score",
                            answer.question_id
                        )));
                    }
                    (Some(score), _) => Some(score),
                    (None, parsed) => parsed.flatten(),
                };
                let score = score.filter(|s| (1..=5).contains(s)).ok_or_else(|| {
                    ServiceError::Validation(format!(
                        "Rating for question {} must be between 1 and 5",
                        answer.question_id
                    ))
                })?;
                (Cow::Owned(score.to_string()), Some(score))
            }
            QuestionType::Text => (Cow::Borrowed(answer.value.as_str()), None),
        };

        checked.push(CheckedAnswer {
            question_id: &answer.question_id,
            question_type: question.question_type,
            value,
            score,
        });
    }

    let unanswered = questions.iter().find(|q| {
        q.required
            && !checked.iter().any(|a| {
                a.question_id == q.id
                    && (a.question_type == QuestionType::Rating || !a.value.trim().is_empty())
            })
    });
    if let Some(q) = unanswered {
        return Err(ServiceError::Validation(format!(
            "Please answer the required question \"{}\"",
            q.question_text
        )));
    }

    Ok(checked)
}

/// Store a full survey submission and run the flag engine over it.
///
/// Analysis is best-effort: a gateway failure leaves that answer without a
/// sentiment record but never fails the submission.
pub async fn submit_responses(
    state: &AppState,
    survey_id: &str,
    input: &SubmissionInput,
) -> Result<SubmissionOutcome, ServiceError> {
    if input.respondent.user_id.trim().is_empty() {
        return Err(ServiceError::Validation("userId is required".to_string()));
    }

    let (profile, stored) = state.with_db_service(|db| {
        let survey = db
            .get_survey(survey_id)?
            .ok_or_else(|| ServiceError::NotFound("Survey".to_string()))?;
        if survey.status != "active" {
            return Err(ServiceError::Conflict(
                "Survey is not accepting responses".to_string(),
            ));
        }
        let questions = db.get_questions(survey_id)?;
        let checked = check_answers(&questions, &input.answers)?;
        let profile = ensure_profile(db, &input.respondent)?;

        let stored = db.with_transaction(|tx| {
            checked
                .iter()
                .map(|a| {
                    tx.insert_response(&NewResponse {
                        survey_id,
                        question_id: a.question_id,
                        employee_id: &profile.id,
                        value: &a.value,
                        score: a.score,
                    })
                    .map(|r| (r, a.question_type))
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok((profile, stored))
    })?;

    let mut answers = Vec::with_capacity(stored.len());
    for (response, question_type) in stored {
        let submitted = match question_type {
            QuestionType::Text => analyze_text_answer(state, response).await,
            QuestionType::Rating => {
                let flag = state.with_db(|db| {
                    Ok(apply_low_rating_policy(
                        db,
                        &response.employee_id,
                        &response.survey_id,
                        question_type,
                        response.response_score,
                    ))
                })?;
                SubmittedAnswer {
                    response,
                    sentiment: None,
                    flag,
                }
            }
        };
        answers.push(submitted);
    }

    state.with_db(|db| {
        if let Err(e) = crate::notification::notify_survey_submission(db) {
            log::warn!("Failed to notify reviewers about submission: {}", e);
        }
        Ok(())
    })?;

    log::info!(
        "Submission stored for survey {}: {} answers from {}",
        survey_id,
        answers.len(),
        profile.id
    );
    Ok(SubmissionOutcome {
        employee_id: profile.id,
        answers,
    })
}

async fn analyze_text_answer(state: &AppState, response: DbResponse) -> SubmittedAnswer {
    let skipped = |response: DbResponse| SubmittedAnswer {
        response,
        sentiment: None,
        flag: FlagOutcome::NotTriggered,
    };

    if response.response_value.trim().is_empty() {
        return skipped(response);
    }

    let verdict = match classify(state, &response.response_value).await {
        Ok(verdict) => verdict,
        Err(e) => {
            log::warn!("Sentiment analysis unavailable for {}: {}", response.id, e);
            return skipped(response);
        }
    };

    match state.with_db(|db| record_verdict(db, &response, &verdict)) {
        Ok(outcome) => SubmittedAnswer {
            response,
            sentiment: Some(outcome.analysis),
            flag: outcome.flag,
        },
        Err(e) => {
            log::error!("Error storing sentiment for {}: {}", response.id, e);
            skipped(response)
        }
    }
}
