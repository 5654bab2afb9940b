//! Sentiment prompt and verdict parsing.
//!
//! The model is asked for a single JSON object. Its answer is validated against
//! a fixed schema; anything that fails validation becomes a heuristic
//! [`SentimentVerdict::Fallback`] instead of an error.

use serde::Serialize;
use serde_json::Value;

use super::provider::ChatMessage;
use crate::db::Sentiment;
use crate::util::truncate_chars;

pub const SENTIMENT_SYSTEM_PROMPT: &str = r#"You are an HR sentiment analysis expert. Analyze employee feedback and provide:
1. Sentiment (positive/negative/neutral)
2. Confidence score (0.00 to 1.00)
3. Key themes (array of 2-5 key topics)
4. Brief summary of the feedback

Respond in JSON format:
{
  "sentiment": "positive|negative|neutral",
  "confidence": 0.85,
  "key_themes": ["work-life balance", "management"],
  "summary": "Brief summary of the feedback"
}"#;

/// Confidence assigned to heuristic verdicts.
pub const FALLBACK_CONFIDENCE: f64 = 0.7;
/// Theme label used whenever the model gave us nothing better.
pub const GENERAL_FEEDBACK_THEME: &str = "general feedback";
/// Heuristic summaries keep this many characters of the employee's text.
const FALLBACK_SUMMARY_CHARS: usize = 200;

pub fn build_sentiment_messages(response_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SENTIMENT_SYSTEM_PROMPT),
        ChatMessage::user(format!("Analyze this employee feedback: \"{}\"", response_text)),
    ]
}

/// A validated (or heuristically derived) sentiment verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub key_themes: Vec<String>,
    pub summary: String,
}

/// How a verdict was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "verdict", rename_all = "lowercase")]
pub enum SentimentVerdict {
    /// The model answered with a JSON object matching the schema.
    Parsed(Verdict),
    /// The model answered with something else; keyword heuristic applied.
    Fallback(Verdict),
}

impl SentimentVerdict {
    pub fn verdict(&self) -> &Verdict {
        match self {
            SentimentVerdict::Parsed(v) | SentimentVerdict::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SentimentVerdict::Fallback(_))
    }
}

/// Turn raw model content into a verdict. Never fails.
pub fn parse_sentiment_verdict(content: &str, response_text: &str) -> SentimentVerdict {
    let cleaned = strip_code_fences(content);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => match validate_verdict(&value) {
            Some(verdict) => SentimentVerdict::Parsed(verdict),
            None => {
                log::warn!("AI verdict failed schema validation: {}", cleaned);
                SentimentVerdict::Fallback(heuristic_verdict(&cleaned, response_text))
            }
        },
        Err(_) => {
            log::warn!("Failed to parse AI response: {}", cleaned);
            SentimentVerdict::Fallback(heuristic_verdict(&cleaned, response_text))
        }
    }
}

/// Keyword scan of the raw model output. "negative" wins over "positive".
pub fn heuristic_verdict(raw_content: &str, response_text: &str) -> Verdict {
    let lower = raw_content.to_lowercase();
    let sentiment = if lower.contains("negative") {
        Sentiment::Negative
    } else if lower.contains("positive") {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };
    Verdict {
        sentiment,
        confidence: FALLBACK_CONFIDENCE,
        key_themes: vec![GENERAL_FEEDBACK_THEME.to_string()],
        summary: truncate_chars(response_text, FALLBACK_SUMMARY_CHARS),
    }
}

/// Strict schema check: sentiment label, confidence in [0, 1], string themes,
/// string summary.
fn validate_verdict(value: &Value) -> Option<Verdict> {
    let obj = value.as_object()?;

    let label = obj.get("sentiment")?.as_str()?.trim().to_lowercase();
    let sentiment = Sentiment::parse(&label)?;

    let confidence = obj.get("confidence")?.as_f64()?;
    if !(0.0..=1.0).contains(&confidence) {
        return None;
    }

    let key_themes = obj
        .get("key_themes")?
        .as_array()?
        .iter()
        .map(|t| t.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;

    let summary = obj.get("summary")?.as_str()?.to_string();

    Some(Verdict {
        sentiment,
        confidence,
        key_themes,
        summary,
    })
}

/// Remove markdown code fences the model sometimes wraps around its JSON.
pub fn strip_code_fences(content: &str) -> String {
    content
        .replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Find the first complete JSON object `{...}` in the text.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape {
            escape = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_embed_response_text() {
        let messages = build_sentiment_messages("Too many meetings");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("\"key_themes\""));
        assert_eq!(
            messages[1].content,
            "Analyze this employee feedback: \"Too many meetings\""
        );
    }

    #[test]
    fn test_parse_valid_verdict() {
        let content = r#"{"sentiment":"negative","confidence":0.92,"key_themes":["management","workload"],"summary":"Employee is overwhelmed"}"#;
        let verdict = parse_sentiment_verdict(content, "I hate my manager");
        assert!(!verdict.is_fallback());
        let v = verdict.verdict();
        assert_eq!(v.sentiment, Sentiment::Negative);
        assert!((v.confidence - 0.92).abs() < 1e-9);
        assert_eq!(v.key_themes, vec!["management", "workload"]);
        assert_eq!(v.summary, "Employee is overwhelmed");
    }

    #[test]
    fn test_parse_strips_markdown_fences() {
        let content = "```json\n{\"sentiment\":\"Positive\",\"confidence\":0.8,\"key_themes\":[],\"summary\":\"Happy\"}\n```";
        let verdict = parse_sentiment_verdict(content, "Love it");
        assert_eq!(verdict.verdict().sentiment, Sentiment::Positive);
        assert!(!verdict.is_fallback());
    }

    #[test]
    fn test_non_json_falls_back_to_keyword_scan() {
        let text = "x".repeat(250);
        let verdict = parse_sentiment_verdict("The overall tone is NEGATIVE and tense.", &text);
        assert!(verdict.is_fallback());
        let v = verdict.verdict();
        assert_eq!(v.sentiment, Sentiment::Negative);
        assert_eq!(v.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(v.key_themes, vec![GENERAL_FEEDBACK_THEME]);
        assert_eq!(v.summary.chars().count(), 200);
    }

    #[test]
    fn test_fallback_prefers_negative_then_positive_then_neutral() {
        assert_eq!(
            heuristic_verdict("positive but also negative", "t").sentiment,
            Sentiment::Negative
        );
        assert_eq!(heuristic_verdict("mostly positive", "t").sentiment, Sentiment::Positive);
        assert_eq!(heuristic_verdict("unclear", "t").sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_schema_violations_fall_back() {
        for content in [
            r#"{"sentiment":"angry","confidence":0.9,"key_themes":[],"summary":"s"}"#,
            r#"{"sentiment":"negative","confidence":1.5,"key_themes":[],"summary":"s"}"#,
            r#"{"sentiment":"negative","confidence":"high","key_themes":[],"summary":"s"}"#,
            r#"{"sentiment":"negative","confidence":0.9,"key_themes":[1,2],"summary":"s"}"#,
            r#"{"sentiment":"negative","confidence":0.9,"key_themes":[]}"#,
            r#"["negative"]"#,
        ] {
            let verdict = parse_sentiment_verdict(content, "text");
            assert!(verdict.is_fallback(), "expected fallback for {content}");
            assert_eq!(verdict.verdict().confidence, FALLBACK_CONFIDENCE);
        }
    }

    #[test]
    fn test_extract_json_object_finds_embedded_object() {
        let text = r#"Here you go: {"summary": "a {nested} brace", "key_themes": ["pay"]} thanks"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"summary": "a {nested} brace", "key_themes": ["pay"]}"#)
        );
        assert_eq!(extract_json_object("no json"), None);
        assert_eq!(extract_json_object("{ unterminated"), None);
    }
}
