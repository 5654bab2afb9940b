use super::*;

const FLAG_COLUMNS: &str = "f.id, f.employee_id, f.survey_id, f.severity, f.issue_type, f.description,
     f.flagged_by, f.status, f.reviewed_by, f.reviewed_at, f.created_at";

fn map_flag(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbFlag> {
    Ok(DbFlag {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        survey_id: row.get(2)?,
        severity: row.get(3)?,
        issue_type: row.get(4)?,
        description: row.get(5)?,
        flagged_by: row.get(6)?,
        status: row.get(7)?,
        reviewed_by: row.get(8)?,
        reviewed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Outcome of a conditional flag insert.
#[derive(Debug, Clone)]
pub enum FlagInsert {
    Created(DbFlag),
    /// A pending flag of the same kind already exists for this employee and survey.
    Duplicate,
}

impl FeedbackDb {
    // =========================================================================
    // Response flags
    // =========================================================================

    /// Insert a pending, system-raised flag.
    ///
    /// Pending negative-sentiment flags are unique per (employee, survey) through
    /// a partial unique index, so the check and the insert are one statement and
    /// concurrent analyses cannot both succeed. Low-rating flags are never
    /// deduplicated.
    pub fn insert_flag(&self, new: &NewFlag<'_>) -> Result<FlagInsert, DbError> {
        let id = new_id("flag");
        let now = now_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO response_flags
                (id, employee_id, survey_id, severity, issue_type, description, flagged_by, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT DO NOTHING",
            params![
                id,
                new.employee_id,
                new.survey_id,
                new.severity.as_str(),
                new.issue_type.as_str(),
                new.description,
                FLAGGED_BY_SYSTEM,
                FLAG_STATUS_PENDING,
                now,
            ],
        )?;

        if inserted == 0 {
            return Ok(FlagInsert::Duplicate);
        }

        Ok(FlagInsert::Created(DbFlag {
            id,
            employee_id: new.employee_id.to_string(),
            survey_id: new.survey_id.to_string(),
            severity: new.severity.as_str().to_string(),
            issue_type: new.issue_type.as_str().to_string(),
            description: new.description.to_string(),
            flagged_by: FLAGGED_BY_SYSTEM.to_string(),
            status: FLAG_STATUS_PENDING.to_string(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        }))
    }

    pub fn get_flag(&self, id: &str) -> Result<Option<DbFlag>, DbError> {
        let sql = format!("SELECT {FLAG_COLUMNS} FROM response_flags f WHERE f.id = ?1");
        Ok(self.conn.query_row(&sql, params![id], map_flag).optional()?)
    }

    /// Pending flags of a survey, newest first, joined with the flagged
    /// employee's name and department. `limit` of `None` returns all.
    pub fn get_pending_flags(
        &self,
        survey_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<FlagWithProfile>, DbError> {
        let sql = format!(
            "SELECT {FLAG_COLUMNS}, p.full_name, p.department
             FROM response_flags f
             LEFT JOIN profiles p ON p.id = f.employee_id
             WHERE f.survey_id = ?1 AND f.status = ?2
             ORDER BY f.created_at DESC, f.id DESC
             LIMIT ?3"
        );
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![survey_id, FLAG_STATUS_PENDING, limit], |row| {
            Ok(FlagWithProfile {
                flag: map_flag(row)?,
                full_name: row.get(11)?,
                department: row.get(12)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Transition a pending flag to reviewed. Returns false when the flag is
    /// missing or no longer pending.
    pub fn mark_flag_reviewed(&self, id: &str, reviewer_id: &str) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE response_flags
             SET status = ?1, reviewed_by = ?2, reviewed_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                FLAG_STATUS_REVIEWED,
                reviewer_id,
                now_rfc3339(),
                id,
                FLAG_STATUS_PENDING
            ],
        )?;
        Ok(changed > 0)
    }
}
