//! Child profile domain type.
//!
//! The birth date is the single source of truth: age is derived at read
//! time and never persisted, so the value is always current.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One child profile per user identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildProfile {
    /// The owning user (device id or account id)
    pub user_id: String,

    pub nickname: String,

    /// Birth date, the only persisted age-related field
    pub birth_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChildProfile {
    /// Age in whole years as of `today`, calendar-aware: one year is
    /// subtracted when today's (month, day) precedes the birth
    /// (month, day).
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        age_from_birth_date(self.birth_date, today)
    }

    /// Age in whole years as of the current UTC date.
    pub fn age(&self) -> i32 {
        self.age_on(Utc::now().date_naive())
    }
}

/// Calendar-aware whole-year age.
pub fn age_from_birth_date(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}
