use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::{DbFlag, DbNotification, DbProfile, DbQuestion, DbSentiment, DbSurvey, FlagWithProfile};
use crate::error::ServiceError;
use crate::services::dashboard::{self, AnalyticsView, DashboardView};
use crate::services::flags::{self, FlagOutcome};
use crate::services::sentiment;
use crate::services::surveys::{
    self, NewSurveyInput, Respondent, SubmissionInput, SubmissionOutcome, SurveyWithQuestions,
};
use crate::state::AppState;

type AppResult<T> = Result<Json<T>, ServiceError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub response_id: String,
    pub response_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: DbSentiment,
    pub fallback: bool,
    pub flag: FlagOutcome,
}

pub async fn analyze_sentiment_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> AppResult<AnalyzeResponse> {
    let Json(payload) = payload?;
    let outcome =
        sentiment::analyze_response(&state, &payload.response_id, &payload.response_text).await?;
    Ok(Json(AnalyzeResponse {
        success: true,
        analysis: outcome.analysis,
        fallback: outcome.fallback,
        flag: outcome.flag,
    }))
}

pub async fn create_survey_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewSurveyInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SurveyWithQuestions>), ServiceError> {
    let Json(payload) = payload?;
    let created = state.with_db_service(|db| surveys::create_survey(db, &payload))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_surveys_handler(State(state): State<Arc<AppState>>) -> AppResult<Vec<DbSurvey>> {
    Ok(Json(state.with_db(|db| db.list_surveys())?))
}

pub async fn list_active_surveys_handler(
    State(state): State<Arc<AppState>>,
) -> AppResult<Vec<DbSurvey>> {
    Ok(Json(state.with_db(|db| db.list_active_surveys())?))
}

pub async fn survey_questions_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
) -> AppResult<Vec<DbQuestion>> {
    Ok(Json(
        state.with_db_service(|db| surveys::get_questions(db, &survey_id))?,
    ))
}

pub async fn delete_survey_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.with_db_service(|db| surveys::delete_survey(db, &survey_id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_responses_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
    payload: Result<Json<SubmissionInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), ServiceError> {
    let Json(payload) = payload?;
    let outcome = surveys::submit_responses(&state, &survey_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
) -> AppResult<DashboardView> {
    Ok(Json(
        state.with_db_service(|db| dashboard::load_dashboard(db, &survey_id))?,
    ))
}

pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
) -> AppResult<AnalyticsView> {
    Ok(Json(
        state.with_db_service(|db| dashboard::load_analytics(db, &survey_id))?,
    ))
}

pub async fn flagged_feed_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
) -> AppResult<Vec<FlagWithProfile>> {
    Ok(Json(
        state.with_db_service(|db| dashboard::flagged_feed(db, &survey_id))?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub reviewer_id: String,
}

pub async fn review_flag_handler(
    State(state): State<Arc<AppState>>,
    Path(flag_id): Path<String>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<DbFlag> {
    let Json(payload) = payload?;
    Ok(Json(state.with_db_service(|db| {
        flags::review_flag(db, &flag_id, &payload.reviewer_id)
    })?))
}

pub async fn register_profile_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Respondent>, JsonRejection>,
) -> AppResult<DbProfile> {
    let Json(payload) = payload?;
    Ok(Json(
        state.with_db_service(|db| surveys::register_profile(db, &payload))?,
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn notifications_handler(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<String>,
    Query(query): Query<InboxQuery>,
) -> AppResult<Vec<DbNotification>> {
    Ok(Json(state.with_db(|db| {
        db.get_notifications(&recipient_id, query.unread_only)
    })?))
}

pub async fn mark_notification_read_handler(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    if !state.with_db(|db| db.mark_notification_read(&notification_id))? {
        return Err(ServiceError::NotFound("Notification".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
