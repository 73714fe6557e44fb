//! User directory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached chat workspace member, keyed by lowercase email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub email: String,
    /// Display name: real name, falling back to the handle.
    pub name: Option<String>,
    /// Member id in the chat workspace.
    pub chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DirectoryUser {
    /// Normalise an email into the directory key form.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}
