//! HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub mod routes;

use routes::*;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/functions/analyze-sentiment", post(analyze_sentiment_handler))
        .route("/surveys", post(create_survey_handler).get(list_surveys_handler))
        .route("/surveys/active", get(list_active_surveys_handler))
        .route("/surveys/{id}", delete(delete_survey_handler))
        .route("/surveys/{id}/questions", get(survey_questions_handler))
        .route("/surveys/{id}/responses", post(submit_responses_handler))
        .route("/surveys/{id}/dashboard", get(dashboard_handler))
        .route("/surveys/{id}/analytics", get(analytics_handler))
        .route("/surveys/{id}/flags", get(flagged_feed_handler))
        .route("/flags/{id}/review", post(review_flag_handler))
        .route("/profiles", post(register_profile_handler))
        .route("/notifications/{id}", get(notifications_handler))
        .route("/notifications/{id}/read", post(mark_notification_read_handler))
        .route("/health", get(health_handler))
        .layer(cors())
        .with_state(state)
}
