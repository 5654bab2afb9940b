use super::*;

impl FeedbackDb {
    // =========================================================================
    // Survey responses
    // =========================================================================

    /// Persist one submitted answer. Responses are immutable once written.
    pub fn insert_response(&self, new: &NewResponse<'_>) -> Result<DbResponse, DbError> {
        let id = new_id("resp");
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO survey_responses (id, survey_id, question_id, employee_id, response_value, response_score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                new.survey_id,
                new.question_id,
                new.employee_id,
                new.value,
                new.score,
                now
            ],
        )?;
        Ok(DbResponse {
            id,
            survey_id: new.survey_id.to_string(),
            question_id: new.question_id.to_string(),
            employee_id: new.employee_id.to_string(),
            response_value: new.value.to_string(),
            response_score: new.score,
            created_at: now,
        })
    }

    pub fn get_response(&self, id: &str) -> Result<Option<DbResponse>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, survey_id, question_id, employee_id, response_value, response_score, created_at
                 FROM survey_responses WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DbResponse {
                        id: row.get(0)?,
                        survey_id: row.get(1)?,
                        question_id: row.get(2)?,
                        employee_id: row.get(3)?,
                        response_value: row.get(4)?,
                        response_score: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?)
    }

    /// All responses of a survey joined with the author's profile and the
    /// sentiment verdict, if any. Oldest first.
    pub fn get_survey_response_rows(&self, survey_id: &str) -> Result<Vec<ResponseRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.question_id, r.employee_id, r.response_value, r.response_score,
                    r.created_at, p.full_name, p.department, sa.sentiment
             FROM survey_responses r
             LEFT JOIN profiles p ON p.id = r.employee_id
             LEFT JOIN sentiment_analysis sa ON sa.response_id = r.id
             WHERE r.survey_id = ?1
             ORDER BY r.created_at ASC, r.id ASC",
        )?;
        let rows = stmt.query_map(params![survey_id], |row| {
            let sentiment: Option<String> = row.get(8)?;
            Ok(ResponseRow {
                id: row.get(0)?,
                question_id: row.get(1)?,
                employee_id: row.get(2)?,
                response_value: row.get(3)?,
                response_score: row.get(4)?,
                created_at: row.get(5)?,
                full_name: row.get(6)?,
                department: row.get(7)?,
                sentiment: sentiment.as_deref().and_then(Sentiment::parse),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
