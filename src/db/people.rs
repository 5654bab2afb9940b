use super::*;

fn map_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbProfile> {
    Ok(DbProfile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        department: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl FeedbackDb {
    // =========================================================================
    // Profiles and roles
    // =========================================================================

    pub fn get_profile_by_user(&self, user_id: &str) -> Result<Option<DbProfile>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, user_id, email, full_name, department, role, created_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
                map_profile,
            )
            .optional()?)
    }

    /// Create or update the profile for `user_id`. The profile role replaces
    /// any role the user held before.
    pub fn upsert_profile(
        &self,
        user_id: &str,
        email: &str,
        full_name: &str,
        department: &str,
        role: AppRole,
    ) -> Result<DbProfile, DbError> {
        self.with_transaction(|db| {
            let now = now_rfc3339();
            db.conn.execute(
                "INSERT INTO profiles (id, user_id, email, full_name, department, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(user_id) DO UPDATE SET
                    email = excluded.email,
                    full_name = excluded.full_name,
                    department = excluded.department,
                    role = excluded.role,
                    updated_at = excluded.updated_at",
                params![new_id("prof"), user_id, email, full_name, department, role.as_str(), now],
            )?;
            db.conn.execute(
                "DELETE FROM user_roles WHERE user_id = ?1 AND role <> ?2",
                params![user_id, role.as_str()],
            )?;
            db.assign_role(user_id, role)?;

            db.get_profile_by_user(user_id)?
                .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    /// Grant `role` to `user_id`. Granting an existing role is a no-op.
    pub fn assign_role(&self, user_id: &str, role: AppRole) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO user_roles (id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, role) DO NOTHING",
            params![new_id("role"), user_id, role.as_str(), now_rfc3339()],
        )?;
        Ok(())
    }

    pub fn has_role(&self, user_id: &str, role: AppRole) -> Result<bool, DbError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2",
                params![user_id, role.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// User ids of everyone holding `role`, in grant order.
    pub fn get_user_ids_with_role(&self, role: AppRole) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM user_roles WHERE role = ?1 ORDER BY created_at, user_id",
        )?;
        let rows = stmt.query_map(params![role.as_str()], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
