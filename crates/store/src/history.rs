//! Conversation-history store: sessions and their ordered messages.
//!
//! A session belongs to exactly one user; every ownership check treats
//! a foreign session exactly like a missing one, so existence never
//! leaks across users. The "current session" for a user is never
//! stored; it is the session with the greatest `updated_at`.
//!
//! Appends are single-row writes with no per-session serialization:
//! two concurrent requests on one session may interleave their writes.
//! Accepted limitation, documented rather than locked around.

use crate::profile::parse_timestamp;
use chrono::Utc;
use nestchat_core::error::StoreError;
use nestchat_core::message::{ChatTurn, Role, SessionHistory, SessionId};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Sessions and messages, keyed by (user id, session id).
#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Create the store, running its migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id  TEXT PRIMARY KEY NOT NULL,
                user_id     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Storage(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(session_id),
                user_id     TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Storage(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, updated_at DESC)")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Storage(format!("sessions index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, id)")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Storage(format!("messages index: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a new empty session for the user.
    pub async fn create_session(&self, user_id: &str) -> Result<SessionId, StoreError> {
        let session_id = SessionId::new();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(&session_id.0)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT session: {e}")))?;

        debug!(user = %user_id, session = %session_id, "Session created");
        Ok(session_id)
    }

    /// The user's most-recently-updated session, if any.
    pub async fn current_session(&self, user_id: &str) -> Result<Option<SessionId>, StoreError> {
        let row = sqlx::query(
            "SELECT session_id FROM sessions WHERE user_id = ?1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SELECT current session: {e}")))?;

        Ok(row.map(|r| {
            SessionId(r.try_get::<String, _>("session_id").unwrap_or_default())
        }))
    }

    /// Whether the session exists and belongs to `user_id`. Foreign
    /// ownership and absence are indistinguishable by design.
    async fn owns_session(&self, user_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT user_id FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("SELECT session owner: {e}")))?;

        Ok(matches!(
            row.map(|r| r.try_get::<String, _>("user_id").unwrap_or_default()),
            Some(owner) if owner == user_id
        ))
    }

    /// Append one turn to a session, advancing its `updated_at`.
    /// Returns `false` when the session is absent or foreign-owned.
    pub async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<bool, StoreError> {
        if !self.owns_session(user_id, session_id).await? {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO messages (session_id, user_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message: {e}")))?;

        sqlx::query("UPDATE sessions SET updated_at = ?2 WHERE session_id = ?1")
            .bind(session_id)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE session timestamp: {e}")))?;

        Ok(true)
    }

    /// The last `limit` turns of a session in chronological order.
    /// Absent or foreign sessions yield an empty list.
    pub async fn recent_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatTurn>, StoreError> {
        if limit == 0 || !self.owns_session(user_id, session_id).await? {
            return Ok(vec![]);
        }

        // Insertion order descending, then reversed back to chronological.
        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM messages WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SELECT recent messages: {e}")))?;

        let mut turns: Vec<ChatTurn> = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<_, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    /// The full transcript of a session (or of the current session when
    /// `session_id` is `None`), with session metadata.
    pub async fn history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<SessionHistory>, StoreError> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => match self.current_session(user_id).await? {
                Some(id) => id.0,
                None => return Ok(None),
            },
        };

        let session_row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?1 AND user_id = ?2")
            .bind(&session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("SELECT session: {e}")))?;

        let Some(session_row) = session_row else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM messages WHERE session_id = ?1 ORDER BY id",
        )
        .bind(&session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SELECT messages: {e}")))?;

        let messages: Vec<ChatTurn> = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<_, _>>()?;

        Ok(Some(SessionHistory {
            session_id: SessionId(session_id),
            message_count: messages.len(),
            messages,
            created_at: parse_timestamp(&session_row, "created_at"),
            updated_at: parse_timestamp(&session_row, "updated_at"),
        }))
    }

    /// Remove all messages from a session, keeping the session itself.
    pub async fn clear_session(&self, user_id: &str, session_id: &str) -> Result<bool, StoreError> {
        if !self.owns_session(user_id, session_id).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE messages: {e}")))?;

        sqlx::query("UPDATE sessions SET updated_at = ?2 WHERE session_id = ?1")
            .bind(session_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE session timestamp: {e}")))?;

        Ok(true)
    }

    /// Delete a session and its messages.
    pub async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool, StoreError> {
        if !self.owns_session(user_id, session_id).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE messages: {e}")))?;

        sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE session: {e}")))?;

        Ok(true)
    }

    /// Delete every session (and message) belonging to a user.
    /// `Ok(false)` when the user has none.
    pub async fn delete_all_sessions(&self, user_id: &str) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM messages WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE user messages: {e}")))?;

        let sessions = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE user sessions: {e}")))?;

        Ok(sessions.rows_affected() > 0)
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ChatTurn, StoreError> {
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::Storage(format!("role column: {e}")))?;
        let role: Role = role_str
            .parse()
            .map_err(|e: String| StoreError::Storage(e))?;

        Ok(ChatTurn {
            role,
            content: row
                .try_get("content")
                .map_err(|e| StoreError::Storage(format!("content column: {e}")))?,
            timestamp: parse_timestamp(row, "timestamp"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> HistoryStore {
        let pool = crate::connect("sqlite::memory:").await.unwrap();
        HistoryStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn create_session_and_append() {
        let store = test_store().await;
        let sid = store.create_session("u1").await.unwrap();

        assert!(store
            .append_message("u1", &sid.0, Role::User, "孩子不肯写作业")
            .await
            .unwrap());
        assert!(store
            .append_message("u1", &sid.0, Role::Assistant, "先共情")
            .await
            .unwrap());

        let history = store.history("u1", Some(&sid.0)).await.unwrap().unwrap();
        assert_eq!(history.message_count, 2);
        assert_eq!(history.messages[0].role, Role::User);
        assert_eq!(history.messages[1].content, "先共情");
    }

    #[tokio::test]
    async fn append_to_unknown_session_fails() {
        let store = test_store().await;
        let ok = store
            .append_message("u1", "no-such-session", Role::User, "hi")
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn foreign_session_is_invisible() {
        let store = test_store().await;
        let sid = store.create_session("owner").await.unwrap();
        store
            .append_message("owner", &sid.0, Role::User, "secret")
            .await
            .unwrap();

        // Another user sees exactly what they would for a missing session.
        assert!(!store
            .append_message("intruder", &sid.0, Role::User, "hi")
            .await
            .unwrap());
        assert!(store.history("intruder", Some(&sid.0)).await.unwrap().is_none());
        assert!(store
            .recent_messages("intruder", &sid.0, 10)
            .await
            .unwrap()
            .is_empty());
        assert!(!store.delete_session("intruder", &sid.0).await.unwrap());
    }

    #[tokio::test]
    async fn current_session_is_most_recently_updated() {
        let store = test_store().await;
        let first = store.create_session("u1").await.unwrap();
        let second = store.create_session("u1").await.unwrap();

        // Appending to the first session makes it current again.
        store
            .append_message("u1", &first.0, Role::User, "hello")
            .await
            .unwrap();

        let current = store.current_session("u1").await.unwrap().unwrap();
        assert_eq!(current, first);
        assert_ne!(current, second);
    }

    #[tokio::test]
    async fn current_session_absent_for_new_user() {
        let store = test_store().await;
        assert!(store.current_session("fresh").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_messages_returns_trailing_window_in_order() {
        let store = test_store().await;
        let sid = store.create_session("u1").await.unwrap();
        for i in 0..6 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store
                .append_message("u1", &sid.0, role, &format!("m{i}"))
                .await
                .unwrap();
        }

        let recent = store.recent_messages("u1", &sid.0, 4).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(recent[3].content, "m5");

        let all = store.recent_messages("u1", &sid.0, 100).await.unwrap();
        assert_eq!(all.len(), 6);

        assert!(store.recent_messages("u1", &sid.0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_defaults_to_current_session() {
        let store = test_store().await;
        let sid = store.create_session("u1").await.unwrap();
        store
            .append_message("u1", &sid.0, Role::User, "question")
            .await
            .unwrap();

        let history = store.history("u1", None).await.unwrap().unwrap();
        assert_eq!(history.session_id, sid);
        assert_eq!(history.message_count, 1);

        assert!(store.history("nobody", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_session_keeps_session() {
        let store = test_store().await;
        let sid = store.create_session("u1").await.unwrap();
        store
            .append_message("u1", &sid.0, Role::User, "question")
            .await
            .unwrap();

        assert!(store.clear_session("u1", &sid.0).await.unwrap());
        let history = store.history("u1", Some(&sid.0)).await.unwrap().unwrap();
        assert_eq!(history.message_count, 0);
    }

    #[tokio::test]
    async fn delete_session_removes_everything() {
        let store = test_store().await;
        let sid = store.create_session("u1").await.unwrap();
        store
            .append_message("u1", &sid.0, Role::User, "question")
            .await
            .unwrap();

        assert!(store.delete_session("u1", &sid.0).await.unwrap());
        assert!(store.history("u1", Some(&sid.0)).await.unwrap().is_none());
        assert!(store.current_session("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_sessions_for_user() {
        let store = test_store().await;
        let s1 = store.create_session("u1").await.unwrap();
        let _s2 = store.create_session("u1").await.unwrap();
        let other = store.create_session("u2").await.unwrap();
        store
            .append_message("u1", &s1.0, Role::User, "question")
            .await
            .unwrap();

        assert!(store.delete_all_sessions("u1").await.unwrap());
        assert!(store.current_session("u1").await.unwrap().is_none());
        // Other users' sessions are untouched.
        assert_eq!(store.current_session("u2").await.unwrap().unwrap(), other);

        assert!(!store.delete_all_sessions("u1").await.unwrap());
    }
}
