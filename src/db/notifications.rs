use super::*;

impl FeedbackDb {
    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn insert_notification(
        &self,
        recipient_id: &str,
        title: &str,
        message: &str,
        kind: &str,
        related_id: Option<&str>,
    ) -> Result<DbNotification, DbError> {
        let id = new_id("ntf");
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO notifications (id, recipient_id, title, message, type, related_id, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![id, recipient_id, title, message, kind, related_id, now],
        )?;
        Ok(DbNotification {
            id,
            recipient_id: recipient_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            kind: kind.to_string(),
            related_id: related_id.map(str::to_string),
            read: false,
            created_at: now,
        })
    }

    /// Notifications for a recipient, newest first.
    pub fn get_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<Vec<DbNotification>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recipient_id, title, message, type, related_id, read, created_at
             FROM notifications
             WHERE recipient_id = ?1 AND (?2 = 0 OR read = 0)
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![recipient_id, unread_only], |row| {
            Ok(DbNotification {
                id: row.get(0)?,
                recipient_id: row.get(1)?,
                title: row.get(2)?,
                message: row.get(3)?,
                kind: row.get(4)?,
                related_id: row.get(5)?,
                read: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark one notification read. Returns false if it does not exist.
    pub fn mark_notification_read(&self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("UPDATE notifications SET read = 1 WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
