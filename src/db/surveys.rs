use super::*;

const SURVEY_COLUMNS: &str = "id, title, description, status, survey_type, created_by, created_at";

fn map_survey(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbSurvey> {
    Ok(DbSurvey {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        survey_type: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_question(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbQuestion> {
    let raw_type: String = row.get(3)?;
    let question_type = QuestionType::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown question type '{raw_type}'").into(),
        )
    })?;
    Ok(DbQuestion {
        id: row.get(0)?,
        survey_id: row.get(1)?,
        question_text: row.get(2)?,
        question_type,
        required: row.get(4)?,
        order_index: row.get(5)?,
    })
}

impl FeedbackDb {
    // =========================================================================
    // Surveys
    // =========================================================================

    /// Insert a new active survey.
    pub fn create_survey(
        &self,
        title: &str,
        description: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<DbSurvey, DbError> {
        let id = new_id("svy");
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO surveys (id, title, description, status, survey_type, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'active', 'general', ?4, ?5, ?5)",
            params![id, title, description, created_by, now],
        )?;
        Ok(DbSurvey {
            id,
            title: title.to_string(),
            description: description.map(str::to_string),
            status: "active".to_string(),
            survey_type: "general".to_string(),
            created_by: created_by.map(str::to_string),
            created_at: now,
        })
    }

    pub fn get_survey(&self, id: &str) -> Result<Option<DbSurvey>, DbError> {
        let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], map_survey).optional()?)
    }

    /// All surveys, newest first.
    pub fn list_surveys(&self) -> Result<Vec<DbSurvey>, DbError> {
        let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys ORDER BY created_at DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_survey)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Surveys open for answers, newest first.
    pub fn list_active_surveys(&self) -> Result<Vec<DbSurvey>, DbError> {
        let sql = format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE status = 'active' ORDER BY created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_survey)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a survey and everything hanging off it. Returns false if it did not exist.
    pub fn delete_survey(&self, id: &str) -> Result<bool, DbError> {
        self.with_transaction(|db| {
            // Explicit cleanup so deletes also work with FK enforcement disabled.
            db.conn.execute(
                "DELETE FROM sentiment_analysis WHERE response_id IN
                    (SELECT id FROM survey_responses WHERE survey_id = ?1)",
                params![id],
            )?;
            db.conn.execute("DELETE FROM survey_responses WHERE survey_id = ?1", params![id])?;
            db.conn.execute("DELETE FROM response_flags WHERE survey_id = ?1", params![id])?;
            db.conn.execute("DELETE FROM survey_questions WHERE survey_id = ?1", params![id])?;
            let removed = db.conn.execute("DELETE FROM surveys WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }

    // =========================================================================
    // Questions
    // =========================================================================

    pub fn insert_question(
        &self,
        survey_id: &str,
        question_text: &str,
        question_type: QuestionType,
        required: bool,
        order_index: i32,
    ) -> Result<DbQuestion, DbError> {
        let id = new_id("q");
        self.conn.execute(
            "INSERT INTO survey_questions (id, survey_id, question_text, question_type, required, order_index, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                survey_id,
                question_text,
                question_type.as_str(),
                required,
                order_index,
                now_rfc3339(),
            ],
        )?;
        Ok(DbQuestion {
            id,
            survey_id: survey_id.to_string(),
            question_text: question_text.to_string(),
            question_type,
            required,
            order_index,
        })
    }

    /// Questions of a survey in display order.
    pub fn get_questions(&self, survey_id: &str) -> Result<Vec<DbQuestion>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, survey_id, question_text, question_type, required, order_index
             FROM survey_questions
             WHERE survey_id = ?1
             ORDER BY order_index",
        )?;
        let rows = stmt.query_map(params![survey_id], map_question)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_question(&self, id: &str) -> Result<Option<DbQuestion>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, survey_id, question_text, question_type, required, order_index
                 FROM survey_questions WHERE id = ?1",
                params![id],
                map_question,
            )
            .optional()?)
    }
}
