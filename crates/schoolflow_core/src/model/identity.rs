//! Authenticated identity as reported by the session provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signed-in subject. Owned by the session provider; the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Opaque subject id; also the remote document id.
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Creates an identity carrying only a subject id.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            created_at: None,
        }
    }

    /// Returns whether both values refer to the same subject.
    pub fn same_subject(&self, other: &Identity) -> bool {
        self.uid == other.uid
    }
}
