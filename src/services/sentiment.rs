// Sentiment service
// Classifies a text answer through the completion provider, stores the verdict
// and runs the negative-sentiment flag policy.

use serde::Serialize;

use crate::db::{DbError, DbResponse, DbSentiment, FeedbackDb};
use crate::error::ServiceError;
use crate::intelligence::{
    build_sentiment_messages, parse_sentiment_verdict, CompletionError, SentimentVerdict,
};
use crate::services::flags::{apply_negative_sentiment_policy, FlagOutcome};
use crate::state::AppState;

/// A stored verdict together with what the flag engine did with it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub analysis: DbSentiment,
    pub fallback: bool,
    pub flag: FlagOutcome,
}

/// Ask the model for a verdict. Only transport and gateway failures are
/// errors; unreadable output becomes a fallback verdict.
pub async fn classify(state: &AppState, response_text: &str) -> Result<SentimentVerdict, CompletionError> {
    let messages = build_sentiment_messages(response_text);
    let content = state.provider.complete(&messages).await?;
    Ok(parse_sentiment_verdict(&content, response_text))
}

/// Persist a verdict for `response` and apply the flag policy to it.
pub fn record_verdict(
    db: &FeedbackDb,
    response: &DbResponse,
    verdict: &SentimentVerdict,
) -> Result<AnalysisOutcome, DbError> {
    let v = verdict.verdict();
    let analysis = db.insert_sentiment(
        &response.id,
        v.sentiment,
        v.confidence,
        &v.key_themes,
        &v.summary,
    )?;

    let flag = apply_negative_sentiment_policy(
        db,
        &response.employee_id,
        &response.survey_id,
        &analysis,
        &response.response_value,
    );

    Ok(AnalysisOutcome {
        analysis,
        fallback: verdict.is_fallback(),
        flag,
    })
}

/// Analyze one stored response end to end.
///
/// The database lock is released while the model call is in flight.
pub async fn analyze_response(
    state: &AppState,
    response_id: &str,
    response_text: &str,
) -> Result<AnalysisOutcome, ServiceError> {
    if response_id.trim().is_empty() {
        return Err(ServiceError::Validation("responseId is required".to_string()));
    }
    if response_text.trim().is_empty() {
        return Err(ServiceError::Validation("responseText is required".to_string()));
    }

    let response = state.with_db_service(|db| {
        let response = db
            .get_response(response_id)?
            .ok_or_else(|| ServiceError::NotFound("Response".to_string()))?;
        if db.get_sentiment_for_response(response_id)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Response {} has already been analyzed",
                response_id
            )));
        }
        Ok(response)
    })?;

    log::info!("Analyzing sentiment for response {}", response_id);
    let verdict = classify(state, response_text).await?;
    if verdict.is_fallback() {
        log::warn!("Using heuristic verdict for response {}", response_id);
    }

    let outcome = state.with_db(|db| record_verdict(db, &response, &verdict))?;
    log::info!(
        "Sentiment analysis completed for {}: {} ({:.2})",
        response_id,
        outcome.analysis.sentiment.as_str(),
        outcome.analysis.confidence
    );
    Ok(outcome)
}
