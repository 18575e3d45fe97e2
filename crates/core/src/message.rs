//! Conversation domain types.
//!
//! These are the value objects that flow through the whole system:
//! a parent sends a message → the gateway resolves a session → the
//! advisor assembles turns → the provider sends them upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The parent asking for advice
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (persona, mode, age band)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A single role-tagged turn in a conversation. Immutable once recorded;
/// ordering within a session is by timestamp / insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who sent this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp (insertion time)
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// How verbose the assistant's answer should be.
///
/// Parsing is lenient: anything that is not `"concise"` maps to
/// `Detailed`, so a typo'd mode string degrades to the default branch
/// instead of failing the request. Callers that care log unknown
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Concise,
    #[default]
    Detailed,
}

impl ResponseMode {
    /// Lenient parse: `"concise"` → Concise, everything else → Detailed.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "concise" => ResponseMode::Concise,
            _ => ResponseMode::Detailed,
        }
    }

    /// Whether `s` names a recognized mode.
    pub fn is_known(s: &str) -> bool {
        matches!(s, "concise" | "detailed")
    }
}

/// A full session transcript with its metadata, as returned by the
/// History Store's read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: SessionId,
    pub messages: Vec<ChatTurn>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
