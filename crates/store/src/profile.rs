//! The child-profile store: one row per user id.
//!
//! Age is never persisted; the birth date is the single source of
//! truth and callers derive the age at read time.

use chrono::{DateTime, NaiveDate, Utc};
use nestchat_core::error::StoreError;
use nestchat_core::profile::ChildProfile;
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Fields accepted when creating a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub nickname: String,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update: absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Keyed-record CRUD over the `profiles` table.
#[derive(Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    /// Create the store, running its migration.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id     TEXT PRIMARY KEY NOT NULL,
                nickname    TEXT NOT NULL,
                birth_date  TEXT NOT NULL,
                grade       TEXT,
                notes       TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Storage(format!("profiles table: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a profile. Fails with `AlreadyExists` when the user
    /// already has one.
    pub async fn create(&self, user_id: &str, data: NewProfile) -> Result<ChildProfile, StoreError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO profiles (user_id, nickname, birth_date, grade, notes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&data.nickname)
        .bind(data.birth_date.format("%Y-%m-%d").to_string())
        .bind(&data.grade)
        .bind(&data.notes)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT profile: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(user_id.to_string()));
        }

        debug!(user = %user_id, "Profile created");
        Ok(ChildProfile {
            user_id: user_id.to_string(),
            nickname: data.nickname,
            birth_date: data.birth_date,
            grade: data.grade,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a profile; absent is `Ok(None)`, not an error.
    pub async fn get(&self, user_id: &str) -> Result<Option<ChildProfile>, StoreError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("SELECT profile: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    /// Partially update a profile; `Ok(None)` when no profile exists.
    pub async fn update(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<ChildProfile>, StoreError> {
        let Some(mut profile) = self.get(user_id).await? else {
            return Ok(None);
        };

        if let Some(nickname) = update.nickname {
            profile.nickname = nickname;
        }
        if let Some(birth_date) = update.birth_date {
            profile.birth_date = birth_date;
        }
        if let Some(grade) = update.grade {
            profile.grade = Some(grade);
        }
        if let Some(notes) = update.notes {
            profile.notes = Some(notes);
        }
        profile.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE profiles
            SET nickname = ?2, birth_date = ?3, grade = ?4, notes = ?5, updated_at = ?6
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .bind(&profile.nickname)
        .bind(profile.birth_date.format("%Y-%m-%d").to_string())
        .bind(&profile.grade)
        .bind(&profile.notes)
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE profile: {e}")))?;

        Ok(Some(profile))
    }

    /// Delete a profile; `Ok(false)` when none existed.
    pub async fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM profiles WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE profile: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<ChildProfile, StoreError> {
        let birth_date_str: String = row
            .try_get("birth_date")
            .map_err(|e| StoreError::Storage(format!("birth_date column: {e}")))?;
        let birth_date = NaiveDate::parse_from_str(&birth_date_str, "%Y-%m-%d")
            .map_err(|e| StoreError::Storage(format!("birth_date parse: {e}")))?;

        Ok(ChildProfile {
            user_id: row
                .try_get("user_id")
                .map_err(|e| StoreError::Storage(format!("user_id column: {e}")))?,
            nickname: row
                .try_get("nickname")
                .map_err(|e| StoreError::Storage(format!("nickname column: {e}")))?,
            birth_date,
            grade: row
                .try_get("grade")
                .map_err(|e| StoreError::Storage(format!("grade column: {e}")))?,
            notes: row
                .try_get("notes")
                .map_err(|e| StoreError::Storage(format!("notes column: {e}")))?,
            created_at: parse_timestamp(row, "created_at"),
            updated_at: parse_timestamp(row, "updated_at"),
        })
    }
}

pub(crate) fn parse_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> DateTime<Utc> {
    row.try_get::<String, _>(column)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
