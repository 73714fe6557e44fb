//! Chat workspace API.
//!
//! [`ChatApi`] is the seam between the tools/directory code and the chat
//! provider. [`SlackClient`] is the production implementation.

mod slack;

pub use slack::{SlackClient, DEFAULT_BASE_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type for chat API calls.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat bot token is not configured")]
    MissingToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat API method {method} failed: {error}")]
    Api { method: String, error: String },
}

/// Profile section of a workspace member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A workspace member as returned by `users.list`.
///
/// Fields we do not interpret are kept in `extra` so tool output carries
/// the full record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: MemberProfile,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMember {
    /// Profile email, if present and non-empty.
    pub fn email(&self) -> Option<&str> {
        self.profile
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Real name, falling back to the handle.
    pub fn display_name(&self) -> Option<&str> {
        self.real_name
            .as_deref()
            .or(self.profile.real_name.as_deref())
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// Whether this member is a live human with an email address.
    pub fn is_active_human(&self) -> bool {
        !self.deleted && !self.is_bot && self.email().is_some()
    }
}

/// Chat provider operations used by the tools and the directory refresh.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a message to a channel. Returns the provider's response body.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<Value, ChatError>;

    /// Every member of the workspace, across all result pages.
    async fn list_members(&self) -> Result<Vec<ChatMember>, ChatError>;

    /// Members that are neither deleted nor bots and have an email.
    async fn active_members(&self) -> Result<Vec<ChatMember>, ChatError> {
        let members = self.list_members().await?;
        Ok(members.into_iter().filter(ChatMember::is_active_human).collect())
    }
}
