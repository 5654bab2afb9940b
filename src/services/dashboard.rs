// Dashboard service
// Read-side aggregations over one survey's responses and flags. Everything is
// scoped by an explicit survey id; the pure functions below take rows and
// return view structs so they can be tested without a database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;
use serde::Serialize;

use crate::db::{
    DbQuestion, FeedbackDb, FlagWithProfile, QuestionType, ResponseRow, Sentiment,
};
use crate::error::ServiceError;

const UNKNOWN_DEPARTMENT: &str = "Unknown";
const FLAGGED_FEED_LIMIT: u32 = 5;
const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "love", "amazing", "positive"];
const NEGATIVE_WORDS: &[&str] = &["bad", "terrible", "poor", "hate", "negative"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentScore {
    pub department: String,
    pub average_score: f64,
    /// Average as a share of the 5-point maximum, rounded.
    pub percentage: i64,
    pub response_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// UTC day, `YYYY-MM-DD`.
    pub date: String,
    pub percentage: i64,
    pub response_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentFlagCount {
    pub department: String,
    pub negative_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyMetrics {
    pub total_responses: usize,
    pub avg_sentiment: i64,
    pub sentiment_type: Sentiment,
    pub flagged_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedResponse {
    pub value: String,
    pub score: Option<i32>,
    pub sentiment: Option<Sentiment>,
    pub employee_name: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalysis {
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub avg_score: Option<f64>,
    pub response_count: usize,
    pub responses: Vec<AnalyzedResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub survey_id: String,
    pub metrics: SurveyMetrics,
    pub department_scores: Vec<DepartmentScore>,
    pub engagement_trend: Vec<TrendPoint>,
    pub negative_by_department: Vec<DepartmentFlagCount>,
    pub flagged: Vec<FlagWithProfile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsView {
    pub survey_id: String,
    pub distribution: SentimentDistribution,
    pub questions: Vec<QuestionAnalysis>,
    pub department_scores: Vec<DepartmentScore>,
}

fn percent_of_five(average: f64) -> i64 {
    (average / 5.0 * 100.0).round() as i64
}

fn department_of(department: Option<&str>) -> String {
    department
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(UNKNOWN_DEPARTMENT)
        .to_string()
}

/// Average score per department over scored responses, alphabetical.
pub fn department_scores(rows: &[ResponseRow]) -> Vec<DepartmentScore> {
    let mut by_dept: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    for row in rows {
        if let Some(score) = row.response_score {
            by_dept
                .entry(department_of(row.department.as_deref()))
                .or_default()
                .push(score);
        }
    }
    by_dept
        .into_iter()
        .map(|(department, scores)| {
            let average = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
            DepartmentScore {
                department,
                average_score: average,
                percentage: percent_of_five(average),
                response_count: scores.len(),
            }
        })
        .collect()
}

/// Scored responses bucketed by UTC day, oldest day first.
pub fn engagement_trend(rows: &[ResponseRow]) -> Vec<TrendPoint> {
    let mut by_day: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    for row in rows {
        let Some(score) = row.response_score else {
            continue;
        };
        let day = match DateTime::parse_from_rfc3339(&row.created_at) {
            Ok(ts) => ts.naive_utc().date().format("%Y-%m-%d").to_string(),
            Err(e) => {
                log::warn!("Skipping response {} with bad timestamp: {}", row.id, e);
                continue;
            }
        };
        by_day.entry(day).or_default().push(score);
    }
    by_day
        .into_iter()
        .map(|(date, scores)| {
            let average = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
            TrendPoint {
                date,
                percentage: percent_of_five(average),
                response_count: scores.len(),
            }
        })
        .collect()
}

/// Pending flags grouped by the flagged employee's department, most first.
pub fn negative_by_department(flags: &[FlagWithProfile]) -> Vec<DepartmentFlagCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for flag in flags {
        *counts
            .entry(department_of(flag.department.as_deref()))
            .or_default() += 1;
    }
    let mut ranked: Vec<DepartmentFlagCount> = counts
        .into_iter()
        .map(|(department, negative_count)| DepartmentFlagCount {
            department,
            negative_count,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.negative_count
            .cmp(&a.negative_count)
            .then_with(|| a.department.cmp(&b.department))
    });
    ranked
}

/// Headline numbers. Neutral verdicts do not count toward the average.
pub fn survey_metrics(rows: &[ResponseRow], pending_flags: usize) -> SurveyMetrics {
    if rows.is_empty() {
        return SurveyMetrics {
            total_responses: 0,
            avg_sentiment: 0,
            sentiment_type: Sentiment::Neutral,
            flagged_count: pending_flags,
        };
    }

    let respondents: HashSet<&str> = rows.iter().map(|r| r.employee_id.as_str()).collect();
    let positive = rows
        .iter()
        .filter(|r| r.sentiment == Some(Sentiment::Positive))
        .count();
    let negative = rows
        .iter()
        .filter(|r| r.sentiment == Some(Sentiment::Negative))
        .count();
    let polar = positive + negative;
    let avg_sentiment = if polar > 0 {
        (positive as f64 / polar as f64 * 100.0).round() as i64
    } else {
        0
    };
    let sentiment_type = if avg_sentiment >= 60 {
        Sentiment::Positive
    } else if avg_sentiment >= 40 {
        Sentiment::Neutral
    } else {
        Sentiment::Negative
    };

    SurveyMetrics {
        total_responses: respondents.len(),
        avg_sentiment,
        sentiment_type,
        flagged_count: pending_flags,
    }
}

fn sentiment_from_score(score: i32) -> Sentiment {
    if score >= 4 {
        Sentiment::Positive
    } else if score <= 2 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Stored verdicts first; unanalysed ratings are read from their score.
pub fn sentiment_distribution(rows: &[ResponseRow]) -> SentimentDistribution {
    let mut dist = SentimentDistribution::default();
    for row in rows {
        let sentiment = row
            .sentiment
            .or_else(|| row.response_score.map(sentiment_from_score));
        match sentiment {
            Some(Sentiment::Positive) => dist.positive += 1,
            Some(Sentiment::Neutral) => dist.neutral += 1,
            Some(Sentiment::Negative) => dist.negative += 1,
            None => {}
        }
    }
    dist
}

/// Keyword guess for text that never got a verdict.
pub fn infer_sentiment_from_text(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    if POSITIVE_WORDS.iter().any(|w| lower.contains(w)) {
        Sentiment::Positive
    } else if NEGATIVE_WORDS.iter().any(|w| lower.contains(w)) {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Per-question breakdown in display order.
pub fn question_analysis(questions: &[DbQuestion], rows: &[ResponseRow]) -> Vec<QuestionAnalysis> {
    questions
        .iter()
        .map(|q| {
            let answers: Vec<&ResponseRow> =
                rows.iter().filter(|r| r.question_id == q.id).collect();
            let scores: Vec<i32> = answers.iter().filter_map(|r| r.response_score).collect();
            let avg_score = (!scores.is_empty())
                .then(|| scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64);

            let responses = answers
                .iter()
                .map(|r| AnalyzedResponse {
                    value: r.response_value.clone(),
                    score: r.response_score,
                    sentiment: r.sentiment.or_else(|| {
                        (!r.response_value.is_empty())
                            .then(|| infer_sentiment_from_text(&r.response_value))
                    }),
                    employee_name: r.full_name.clone(),
                    department: r.department.clone(),
                })
                .collect();

            QuestionAnalysis {
                question_id: q.id.clone(),
                question_text: q.question_text.clone(),
                question_type: q.question_type,
                avg_score,
                response_count: answers.len(),
                responses,
            }
        })
        .collect()
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("valid fence regex"))
}

/// Remove fenced code blocks from a flag description.
pub fn strip_fenced_blocks(description: &str) -> String {
    fenced_block().replace_all(description, "").trim().to_string()
}

/// Collapse repeated flags (same employee, survey, issue and cleaned
/// description), keeping the first occurrence.
pub fn dedupe_flagged(flags: Vec<FlagWithProfile>) -> Vec<FlagWithProfile> {
    let mut seen = HashSet::new();
    flags
        .into_iter()
        .filter_map(|mut item| {
            item.flag.description = strip_fenced_blocks(&item.flag.description);
            let key = format!(
                "{}-{}-{}-{}",
                item.flag.employee_id, item.flag.survey_id, item.flag.issue_type, item.flag.description
            );
            seen.insert(key).then_some(item)
        })
        .collect()
}

fn require_survey(db: &FeedbackDb, survey_id: &str) -> Result<(), ServiceError> {
    match db.get_survey(survey_id)? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound("Survey".to_string())),
    }
}

/// Most recent pending flags for the review feed.
pub fn flagged_feed(db: &FeedbackDb, survey_id: &str) -> Result<Vec<FlagWithProfile>, ServiceError> {
    require_survey(db, survey_id)?;
    let recent = db.get_pending_flags(survey_id, Some(FLAGGED_FEED_LIMIT))?;
    Ok(dedupe_flagged(recent))
}

pub fn load_dashboard(db: &FeedbackDb, survey_id: &str) -> Result<DashboardView, ServiceError> {
    require_survey(db, survey_id)?;
    let rows = db.get_survey_response_rows(survey_id)?;
    let pending = db.get_pending_flags(survey_id, None)?;

    Ok(DashboardView {
        survey_id: survey_id.to_string(),
        metrics: survey_metrics(&rows, pending.len()),
        department_scores: department_scores(&rows),
        engagement_trend: engagement_trend(&rows),
        negative_by_department: negative_by_department(&pending),
        flagged: flagged_feed(db, survey_id)?,
    })
}

pub fn load_analytics(db: &FeedbackDb, survey_id: &str) -> Result<AnalyticsView, ServiceError> {
    require_survey(db, survey_id)?;
    let rows = db.get_survey_response_rows(survey_id)?;
    let questions = db.get_questions(survey_id)?;

    Ok(AnalyticsView {
        survey_id: survey_id.to_string(),
        distribution: sentiment_distribution(&rows),
        questions: question_analysis(&questions, &rows),
        department_scores: department_scores(&rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_profile, seed_survey, test_db};
    use crate::db::{DbFlag, IssueType, NewFlag, NewResponse, Severity};

    fn row(employee: &str, dept: Option<&str>, score: Option<i32>, sentiment: Option<Sentiment>) -> ResponseRow {
        ResponseRow {
            id: format!("resp-{employee}-{score:?}"),
            question_id: "q-1".into(),
            employee_id: employee.into(),
            response_value: score.map(|s| s.to_string()).unwrap_or_default(),
            response_score: score,
            created_at: "2026-03-02T10:00:00+00:00".into(),
            full_name: None,
            department: dept.map(str::to_string),
            sentiment,
        }
    }

    fn flag(employee: &str, dept: Option<&str>, description: &str) -> FlagWithProfile {
        FlagWithProfile {
            flag: DbFlag {
                id: format!("flag-{employee}-{description}"),
                employee_id: employee.into(),
                survey_id: "svy-1".into(),
                severity: "warning".into(),
                issue_type: "negative_sentiment".into(),
                description: description.into(),
                flagged_by: "system".into(),
                status: "pending".into(),
                reviewed_by: None,
                reviewed_at: None,
                created_at: "2026-03-02T10:00:00+00:00".into(),
            },
            full_name: None,
            department: dept.map(str::to_string),
        }
    }

    #[test]
    fn test_department_scores_normalize_and_default_unknown() {
        let rows = vec![
            row("e1", Some("Sales"), Some(4), None),
            row("e2", Some("Sales"), Some(3), None),
            row("e3", None, Some(5), None),
            row("e4", Some("Sales"), None, Some(Sentiment::Negative)),
        ];
        let scores = department_scores(&rows);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].department, "Sales");
        assert_eq!(scores[0].percentage, 70);
        assert_eq!(scores[0].response_count, 2);
        assert_eq!(scores[1].department, "Unknown");
        assert_eq!(scores[1].percentage, 100);
    }

    #[test]
    fn test_engagement_trend_buckets_by_utc_day() {
        let mut late = row("e1", None, Some(2), None);
        late.created_at = "2026-03-01T23:30:00-05:00".into(); // 04:30 UTC on the 2nd
        let mut early = row("e2", None, Some(4), None);
        early.created_at = "2026-03-01T09:00:00+00:00".into();
        let trend = engagement_trend(&[late, early, row("e3", None, Some(5), None)]);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].date, "2026-03-01");
        assert_eq!(trend[0].percentage, 80);
        assert_eq!(trend[1].date, "2026-03-02");
        assert_eq!(trend[1].response_count, 2);
        assert_eq!(trend[1].percentage, 70);
    }

    #[test]
    fn test_negative_by_department_ranked_by_count() {
        let ranked = negative_by_department(&[
            flag("e1", Some("Ops"), "a"),
            flag("e2", Some("Sales"), "b"),
            flag("e3", Some("Sales"), "c"),
            flag("e4", None, "d"),
        ]);
        assert_eq!(ranked[0].department, "Sales");
        assert_eq!(ranked[0].negative_count, 2);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().any(|d| d.department == "Unknown"));
    }

    #[test]
    fn test_metrics_exclude_neutral() {
        let rows = vec![
            row("e1", None, None, Some(Sentiment::Positive)),
            row("e1", None, None, Some(Sentiment::Positive)),
            row("e2", None, None, Some(Sentiment::Negative)),
            row("e3", None, None, Some(Sentiment::Neutral)),
        ];
        let m = survey_metrics(&rows, 4);
        assert_eq!(m.total_responses, 3);
        assert_eq!(m.avg_sentiment, 67);
        assert_eq!(m.sentiment_type, Sentiment::Positive);
        assert_eq!(m.flagged_count, 4);

        let empty = survey_metrics(&[], 0);
        assert_eq!(empty.sentiment_type, Sentiment::Neutral);

        let unanalysed = survey_metrics(&[row("e1", None, Some(3), None)], 0);
        assert_eq!(unanalysed.avg_sentiment, 0);
        assert_eq!(unanalysed.sentiment_type, Sentiment::Negative);
    }

    #[test]
    fn test_distribution_infers_from_scores() {
        let dist = sentiment_distribution(&[
            row("e1", None, Some(5), None),
            row("e2", None, Some(3), None),
            row("e3", None, Some(1), None),
            row("e4", None, Some(1), Some(Sentiment::Positive)),
            row("e5", None, None, None),
        ]);
        assert_eq!(dist, SentimentDistribution { positive: 2, neutral: 1, negative: 1 });
    }

    #[test]
    fn test_keyword_inference() {
        assert_eq!(infer_sentiment_from_text("Great team"), Sentiment::Positive);
        assert_eq!(infer_sentiment_from_text("Poor tooling"), Sentiment::Negative);
        assert_eq!(infer_sentiment_from_text("It is what it is"), Sentiment::Neutral);
    }

    #[test]
    fn test_flag_feed_strips_fences_and_dedupes() {
        let feed = dedupe_flagged(vec![
            flag("e1", None, "Issue ```json {\"a\":1}``` here"),
            flag("e1", None, "Issue  here"),
            flag("e1", None, "Issue here"),
            flag("e2", None, "Issue here"),
        ]);
        assert_eq!(strip_fenced_blocks("Issue ```x``` here"), "Issue  here");
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].flag.description, "Issue  here");
    }

    #[test]
    fn test_load_dashboard_and_analytics() {
        let db = test_db();
        let (survey_id, qids) = seed_survey(&db, &[QuestionType::Rating, QuestionType::Text]);
        let alice = seed_profile(&db, "alice", "Sales");
        let bob = seed_profile(&db, "bob", "Ops");
        for (employee, score) in [(&alice, 5), (&bob, 1)] {
            db.insert_response(&NewResponse {
                survey_id: &survey_id,
                question_id: &qids[0],
                employee_id: employee,
                value: &score.to_string(),
                score: Some(score),
            })
            .unwrap();
        }
        let text = db
            .insert_response(&NewResponse {
                survey_id: &survey_id,
                question_id: &qids[1],
                employee_id: &bob,
                value: "I hate the new process",
                score: None,
            })
            .unwrap();
        db.insert_sentiment(&text.id, Sentiment::Negative, 0.9, &["process".into()], "Dislikes process")
            .unwrap();
        for _ in 0..7 {
            db.insert_flag(&NewFlag {
                employee_id: &bob,
                survey_id: &survey_id,
                severity: Severity::Warning,
                issue_type: IssueType::LowRating,
                description: "Low rating submitted: 1/5",
            })
            .unwrap();
        }

        let dashboard = load_dashboard(&db, &survey_id).unwrap();
        assert_eq!(dashboard.metrics.total_responses, 2);
        assert_eq!(dashboard.metrics.flagged_count, 7);
        assert_eq!(dashboard.metrics.avg_sentiment, 0);
        assert_eq!(dashboard.negative_by_department[0].department, "Ops");
        assert_eq!(dashboard.negative_by_department[0].negative_count, 7);
        // Five most recent, all identical, collapse to one.
        assert_eq!(dashboard.flagged.len(), 1);
        assert_eq!(dashboard.flagged[0].department.as_deref(), Some("Ops"));

        let analytics = load_analytics(&db, &survey_id).unwrap();
        assert_eq!(analytics.distribution, SentimentDistribution { positive: 1, neutral: 0, negative: 2 });
        assert_eq!(analytics.questions.len(), 2);
        assert_eq!(analytics.questions[0].avg_score, Some(3.0));
        assert_eq!(analytics.questions[1].responses[0].sentiment, Some(Sentiment::Negative));
        assert_eq!(analytics.questions[1].responses[0].employee_name.as_deref(), Some("Person bob"));

        assert!(matches!(load_dashboard(&db, "svy-missing"), Err(ServiceError::NotFound(_))));
    }
}
