use super::*;

fn map_sentiment(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbSentiment> {
    let raw: String = row.get(2)?;
    let sentiment = Sentiment::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown sentiment '{raw}'").into(),
        )
    })?;
    let themes_json: String = row.get(4)?;
    let key_themes: Vec<String> = serde_json::from_str(&themes_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DbSentiment {
        id: row.get(0)?,
        response_id: row.get(1)?,
        sentiment,
        confidence: row.get(3)?,
        key_themes,
        ai_summary: row.get(5)?,
        analyzed_at: row.get(6)?,
    })
}

impl FeedbackDb {
    // =========================================================================
    // Sentiment analysis
    // =========================================================================

    /// Store the verdict for a text response. Key themes are kept as a JSON array.
    pub fn insert_sentiment(
        &self,
        response_id: &str,
        sentiment: Sentiment,
        confidence: f64,
        key_themes: &[String],
        summary: &str,
    ) -> Result<DbSentiment, DbError> {
        let id = new_id("sa");
        let now = now_rfc3339();
        let themes_json = serde_json::to_string(key_themes)?;
        self.conn.execute(
            "INSERT INTO sentiment_analysis (id, response_id, sentiment, confidence, key_themes, ai_summary, analyzed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, response_id, sentiment.as_str(), confidence, themes_json, summary, now],
        )?;
        Ok(DbSentiment {
            id,
            response_id: response_id.to_string(),
            sentiment,
            confidence,
            key_themes: key_themes.to_vec(),
            ai_summary: summary.to_string(),
            analyzed_at: now,
        })
    }

    pub fn get_sentiment_for_response(
        &self,
        response_id: &str,
    ) -> Result<Option<DbSentiment>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, response_id, sentiment, confidence, key_themes, ai_summary, analyzed_at
                 FROM sentiment_analysis WHERE response_id = ?1",
                params![response_id],
                map_sentiment,
            )
            .optional()?)
    }
}
