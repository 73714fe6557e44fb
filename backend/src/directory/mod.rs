//! User directory cache.
//!
//! Keeps a local copy of the chat workspace members keyed by lowercase
//! email, refreshed periodically by a background task.

mod store;

pub use store::JsonDirectoryStore;

use async_trait::async_trait;
use sluice_types::DirectoryUser;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatApi, ChatError};

/// A refresh run that takes longer than this is abandoned.
pub const MAX_REFRESH_DURATION: Duration = Duration::from_secs(300);

/// Error type for directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chat API error: {0}")]
    Chat(#[from] ChatError),

    #[error("Directory refresh timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Input for an upsert. The store fills in timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub email: String,
    pub name: Option<String>,
    pub chat_id: Option<String>,
}

/// Trait for directory storage backends.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Insert or update users by normalised email. Returns how many were written.
    async fn upsert_many(&self, entries: Vec<DirectoryEntry>) -> Result<usize>;

    /// Look up one user. The email is normalised before lookup.
    async fn get_by_email(&self, email: &str) -> Result<Option<DirectoryUser>>;

    /// All users, ordered by email.
    async fn list(&self) -> Result<Vec<DirectoryUser>>;
}

/// Outcome of one refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Active members returned by the chat API.
    pub fetched: usize,
    /// Users written to the store.
    pub saved: usize,
    /// Members dropped because their email was unusable.
    pub skipped: usize,
}

/// Pull active members from the chat API and upsert them into the store.
pub async fn refresh_directory(
    chat: &dyn ChatApi,
    store: &dyn DirectoryStore,
) -> Result<RefreshReport> {
    let members = chat.active_members().await?;
    info!("Retrieved {} users from chat workspace", members.len());

    let mut report = RefreshReport {
        fetched: members.len(),
        ..Default::default()
    };

    let mut entries = Vec::with_capacity(members.len());
    for member in &members {
        let Some(email) = member.email().filter(|e| e.contains('@')) else {
            warn!("Skipping member {}: no usable email", member.id);
            report.skipped += 1;
            continue;
        };
        debug!(
            "Processing user: {} ({})",
            email,
            member.display_name().unwrap_or("unnamed")
        );
        entries.push(DirectoryEntry {
            email: email.to_string(),
            name: member.display_name().map(str::to_string),
            chat_id: Some(member.id.clone()),
        });
    }

    report.saved = store.upsert_many(entries).await?;
    info!("Saved {} users to directory", report.saved);
    Ok(report)
}

/// Run [`refresh_directory`] now and then every `every`, until `shutdown`
/// is cancelled. Failed runs are logged and retried on the next tick.
pub fn spawn_refresh_task(
    chat: Arc<dyn ChatApi>,
    store: Arc<dyn DirectoryStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Directory refresh task started (every {:?})", every);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let run = tokio::time::timeout(
                MAX_REFRESH_DURATION,
                refresh_directory(chat.as_ref(), store.as_ref()),
            );
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = run => outcome.unwrap_or(Err(DirectoryError::Timeout(MAX_REFRESH_DURATION))),
            };

            match outcome {
                Ok(report) => debug!("Directory refresh finished: {:?}", report),
                Err(e) => error!("Failed to refresh user directory: {}", e),
            }
        }

        info!("Directory refresh task stopped");
    })
}
