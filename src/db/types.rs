//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Stored JSON could not be decoded: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Enumerated column values
// ---------------------------------------------------------------------------

/// Question kind. Ratings carry a 1–5 score; text answers go through sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Rating,
    Text,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Rating => "rating",
            QuestionType::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rating" => Some(QuestionType::Rating),
            "text" => Some(QuestionType::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    NegativeSentiment,
    LowRating,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::NegativeSentiment => "negative_sentiment",
            IssueType::LowRating => "low_rating",
        }
    }
}

/// Roles recorded in `user_roles`. Reviewers are `hr_manager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    HrManager,
    Employee,
}

impl AppRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppRole::HrManager => "hr_manager",
            AppRole::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hr_manager" => Some(AppRole::HrManager),
            "employee" => Some(AppRole::Employee),
            _ => None,
        }
    }
}

pub const FLAG_STATUS_PENDING: &str = "pending";
pub const FLAG_STATUS_REVIEWED: &str = "reviewed";
pub const FLAGGED_BY_SYSTEM: &str = "system";

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `surveys` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSurvey {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub survey_type: String,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// A row from `survey_questions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbQuestion {
    pub id: String,
    pub survey_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub required: bool,
    pub order_index: i32,
}

/// A row from `profiles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProfile {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub department: String,
    pub role: String,
    pub created_at: String,
}

/// A row from `survey_responses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbResponse {
    pub id: String,
    pub survey_id: String,
    pub question_id: String,
    pub employee_id: String,
    pub response_value: String,
    pub response_score: Option<i32>,
    pub created_at: String,
}

/// Insert payload for `survey_responses`.
#[derive(Debug, Clone)]
pub struct NewResponse<'a> {
    pub survey_id: &'a str,
    pub question_id: &'a str,
    pub employee_id: &'a str,
    pub value: &'a str,
    pub score: Option<i32>,
}

/// A row from `sentiment_analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSentiment {
    pub id: String,
    pub response_id: String,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub key_themes: Vec<String>,
    pub ai_summary: String,
    pub analyzed_at: String,
}

/// A row from `response_flags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFlag {
    pub id: String,
    pub employee_id: String,
    pub survey_id: String,
    pub severity: String,
    pub issue_type: String,
    pub description: String,
    pub flagged_by: String,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

/// Insert payload for `response_flags`. Status is always `pending` on insert.
#[derive(Debug, Clone)]
pub struct NewFlag<'a> {
    pub employee_id: &'a str,
    pub survey_id: &'a str,
    pub severity: Severity,
    pub issue_type: IssueType,
    pub description: &'a str,
}

/// A pending flag joined with the flagged employee's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagWithProfile {
    #[serde(flatten)]
    pub flag: DbFlag,
    pub full_name: Option<String>,
    pub department: Option<String>,
}

/// A row from `notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbNotification {
    pub id: String,
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_id: Option<String>,
    pub read: bool,
    pub created_at: String,
}

/// A response joined with its author's profile and any sentiment verdict.
/// Read model for the dashboard aggregations.
#[derive(Debug, Clone)]
pub struct ResponseRow {
    pub id: String,
    pub question_id: String,
    pub employee_id: String,
    pub response_value: String,
    pub response_score: Option<i32>,
    pub created_at: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub sentiment: Option<Sentiment>,
}
